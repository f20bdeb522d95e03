use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::clock::{Clock, TimeFormat};
use super::conversation_log::{ConversationLog, Message, Role};
use super::reply::ReplyEngine;
use super::scheduler::ResponseScheduler;
use super::theme::Theme;
use super::timer::{Timer, TimerToken};
use super::transcript::{RenderedMessage, Transcript};
use crate::config::ChatConfig;

/// Options for [`ChatSession::append_message`].
#[derive(Debug, Clone, Copy)]
pub struct AppendOptions {
    /// Defaults to the session clock's current time.
    pub timestamp: Option<DateTime<Local>>,
    pub animate: bool,
}

impl Default for AppendOptions {
    fn default() -> Self {
        Self {
            timestamp: None,
            animate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was recorded.
    Rejected,
    /// The user message was recorded and a reply will arrive after `delay`.
    Scheduled { delay: Duration },
}

/// One chat conversation: the log, the reply engine, the pending reply and
/// the transcripts it renders into.
pub struct ChatSession<T, C> {
    log: ConversationLog,
    engine: ReplyEngine,
    scheduler: ResponseScheduler<T>,
    clock: C,
    format: TimeFormat,
    transcripts: Vec<Box<dyn Transcript + Send>>,
    delivered_tx: mpsc::UnboundedSender<String>,
    delivered_rx: mpsc::UnboundedReceiver<String>,
}

impl<T: Timer, C: Clock> ChatSession<T, C> {
    pub fn new(config: &ChatConfig, timer: T, clock: C) -> Self {
        let format = TimeFormat::new(config.time_format.clone(), config.date_format.clone());
        let (delivered_tx, delivered_rx) = mpsc::unbounded_channel();
        Self {
            log: ConversationLog::new(),
            engine: ReplyEngine::new(format.clone()),
            scheduler: ResponseScheduler::new(timer, config.delay),
            clock,
            format,
            transcripts: Vec::new(),
            delivered_tx,
            delivered_rx,
        }
    }

    pub fn add_transcript(&mut self, transcript: Box<dyn Transcript + Send>) {
        self.transcripts.push(transcript);
    }

    /// Record a user message and schedule the bot's answer. Blank text is
    /// rejected without touching the log.
    pub fn send_message(&mut self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            debug!("Rejected blank message");
            return SendOutcome::Rejected;
        }

        self.append_message(Role::User, text, AppendOptions::default());

        let now = self.clock.now();
        let reply = self.engine.compute_reply(text, &self.log, now);
        let delivered = self.delivered_tx.clone();
        let delay = self.scheduler.schedule(reply, move |reply| {
            // Both ends live in this session, so the receiver outlives the send.
            let _ = delivered.send(reply);
        });

        SendOutcome::Scheduled { delay }
    }

    /// Record a message and render it. Also the entry point for replies that
    /// come from somewhere other than the reply engine. A transcript that
    /// fails to render is logged and skipped; the message is recorded anyway.
    pub fn append_message(&mut self, role: Role, text: &str, options: AppendOptions) {
        let timestamp = options.timestamp.unwrap_or_else(|| self.clock.now());
        let message = self.log.append(role, text, timestamp);
        info!("{} message appended ({} chars)", message.role, message.text.chars().count());

        let rendered = RenderedMessage {
            role,
            text,
            time: self.format.time(&timestamp),
            animate: options.animate,
        };
        for transcript in &mut self.transcripts {
            if let Err(e) = transcript.render(&rendered) {
                warn!("Transcript failed to render {} message: {}", role, e);
            }
        }
    }

    /// Copy of the conversation so far.
    pub fn get_context(&self) -> Vec<Message> {
        self.log.snapshot()
    }

    /// Handle an expired timer. Returns whether a bot reply was delivered.
    pub fn on_timer(&mut self, token: TimerToken) -> bool {
        if !self.scheduler.fire(token) {
            return false;
        }

        let mut delivered = false;
        while let Ok(reply) = self.delivered_rx.try_recv() {
            self.append_message(Role::Bot, &reply, AppendOptions::default());
            delivered = true;
        }
        delivered
    }

    pub fn is_waiting(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn pending_reply(&self) -> Option<&str> {
        self.scheduler.pending_reply()
    }

    pub fn set_theme(&mut self, theme: Theme) {
        for transcript in &mut self.transcripts {
            transcript.set_theme(theme);
        }
    }

    pub fn timer_mut(&mut self) -> &mut T {
        self.scheduler.timer_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::TimeZone;

    use super::*;
    use crate::cli::chat::clock::FixedClock;
    use crate::error::{ChatError, Result};
    use crate::cli::chat::reply::{
        EXPAND_WITHOUT_CONTEXT_REPLY, GREETING_REPLY, JOKE_REPLY, REPEAT_SUFFIX,
    };
    use crate::cli::chat::timer::ManualTimer;

    type Rendered = Arc<Mutex<Vec<(Role, String, String, bool)>>>;

    struct Recorder(Rendered);

    impl Transcript for Recorder {
        fn render(&mut self, message: &RenderedMessage<'_>) -> Result<()> {
            self.0.lock().unwrap().push((
                message.role,
                message.text.to_string(),
                message.time.clone(),
                message.animate,
            ));
            Ok(())
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 9, 30, 0).unwrap()
    }

    fn session() -> (ChatSession<ManualTimer, FixedClock>, Rendered) {
        let rendered = Rendered::default();
        let mut session =
            ChatSession::new(&ChatConfig::default(), ManualTimer::new(), FixedClock(now()));
        session.add_transcript(Box::new(Recorder(rendered.clone())));
        (session, rendered)
    }

    fn advance(session: &mut ChatSession<ManualTimer, FixedClock>, ms: u64) -> usize {
        let due = session.timer_mut().advance(Duration::from_millis(ms));
        let mut delivered = 0;
        for token in due {
            if session.on_timer(token) {
                delivered += 1;
            }
        }
        delivered
    }

    fn bot_texts(session: &ChatSession<ManualTimer, FixedClock>) -> Vec<String> {
        session
            .get_context()
            .into_iter()
            .filter(|m| m.role == Role::Bot)
            .map(|m| m.text)
            .collect()
    }

    #[test]
    fn blank_messages_are_rejected() {
        let (mut session, rendered) = session();
        assert_eq!(session.send_message(""), SendOutcome::Rejected);
        assert_eq!(session.send_message(" \n\t "), SendOutcome::Rejected);
        assert!(session.get_context().is_empty());
        assert!(rendered.lock().unwrap().is_empty());
        assert!(!session.is_waiting());
    }

    #[test]
    fn greeting_is_delivered_after_typing_delay() {
        let (mut session, rendered) = session();
        let outcome = session.send_message("hello");
        let expected_delay = Duration::from_millis(1800);
        assert_eq!(outcome, SendOutcome::Scheduled { delay: expected_delay });

        // Only the user message is visible while the bot is "typing".
        assert_eq!(session.get_context().len(), 1);
        assert_eq!(session.pending_reply(), Some(GREETING_REPLY));

        assert_eq!(advance(&mut session, 1799), 0);
        assert_eq!(advance(&mut session, 1), 1);

        let context = session.get_context();
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role, Role::User);
        assert_eq!(context[0].text, "hello");
        assert_eq!(context[1].role, Role::Bot);
        assert_eq!(context[1].text, GREETING_REPLY);
        assert_eq!(context[1].timestamp, now());

        let rendered = rendered.lock().unwrap();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1].0, Role::Bot);
        assert_eq!(rendered[1].2, "09:30");
    }

    #[test]
    fn time_question_end_to_end() {
        let (mut session, _) = session();
        session.send_message("What time is it?");
        advance(&mut session, 1800);

        let replies = bot_texts(&session);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("09:30"));
        assert!(replies[0].ends_with("Would you like help with timezones or scheduling?"));
    }

    #[test]
    fn explain_without_history_asks_which_part() {
        let (mut session, _) = session();
        session.send_message("explain more");
        advance(&mut session, 1800);
        assert_eq!(bot_texts(&session), [EXPAND_WITHOUT_CONTEXT_REPLY]);
    }

    #[test]
    fn explain_echoes_delivered_reply() {
        let (mut session, _) = session();
        session.send_message("tell me a joke");
        advance(&mut session, 1800);
        session.send_message("explain more");
        advance(&mut session, 1800);

        let replies = bot_texts(&session);
        assert_eq!(replies.len(), 2);
        assert!(replies[1].starts_with("Sure — here are more details: "));
        assert!(replies[1].contains(JOKE_REPLY));
    }

    #[test]
    fn rapid_messages_deliver_only_latest_reply() {
        let (mut session, rendered) = session();
        session.send_message("tell me a joke");
        advance(&mut session, 200);
        session.send_message("I have a problem");
        advance(&mut session, 10_000);

        let replies = bot_texts(&session);
        assert_eq!(replies.len(), 1);
        assert!(replies[0].starts_with("Sure — can you describe the issue"));
        assert_eq!(rendered.lock().unwrap().len(), 3);
    }

    #[test]
    fn cancelled_reply_still_counts_for_repeats() {
        let (mut session, _) = session();
        session.send_message("tell me a joke");
        session.send_message("another joke");
        advance(&mut session, 10_000);

        assert_eq!(bot_texts(&session), [format!("{JOKE_REPLY}{REPEAT_SUFFIX}")]);
    }

    #[test]
    fn context_is_stable_between_appends() {
        let (mut session, _) = session();
        session.send_message("hello");
        advance(&mut session, 1800);

        assert_eq!(session.get_context(), session.get_context());
    }

    #[test]
    fn injected_messages_are_logged_and_rendered() {
        let (mut session, rendered) = session();
        let earlier = now() - chrono::Duration::minutes(5);
        session
            .append_message(
                Role::Bot,
                "Welcome back!",
                AppendOptions {
                    timestamp: Some(earlier),
                    animate: false,
                },
            );

        let context = session.get_context();
        assert_eq!(context[0].timestamp, earlier);
        assert!(!session.is_waiting());

        let rendered = rendered.lock().unwrap();
        assert_eq!(rendered[0], (Role::Bot, "Welcome back!".to_string(), "09:25".to_string(), false));
    }

    #[test]
    fn sessions_are_independent() {
        let (mut first, _) = session();
        let (mut second, _) = session();
        first.send_message("joke");
        second.send_message("joke");
        assert_eq!(first.pending_reply(), Some(JOKE_REPLY));
        assert_eq!(second.pending_reply(), Some(JOKE_REPLY));
    }

    struct Broken;

    impl Transcript for Broken {
        fn render(&mut self, _message: &RenderedMessage<'_>) -> Result<()> {
            Err(ChatError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
    }

    #[test]
    fn failing_transcript_does_not_stop_replies() {
        let rendered = Rendered::default();
        let mut session =
            ChatSession::new(&ChatConfig::default(), ManualTimer::new(), FixedClock(now()));
        session.add_transcript(Box::new(Broken));
        session.add_transcript(Box::new(Recorder(rendered.clone())));

        let outcome = session.send_message("tell me a joke");
        assert!(matches!(outcome, SendOutcome::Scheduled { .. }));
        assert!(session.is_waiting());
        assert_eq!(advance(&mut session, 1800), 1);

        assert_eq!(bot_texts(&session), [JOKE_REPLY]);
        // Transcripts after the broken one still see every message.
        let roles: Vec<Role> = rendered.lock().unwrap().iter().map(|r| r.0).collect();
        assert_eq!(roles, [Role::User, Role::Bot]);
    }
}
