pub mod clock;
pub mod command;
pub mod conversation_log;
pub mod prompt;
pub mod reply;
pub mod scheduler;
pub mod session;
pub mod theme;
pub mod timer;
pub mod transcript;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use color_print::cstr;
use command::Command;
use eyre::Result;
use prompt::{generate_prompt, spawn_composer, ComposerEvent};
use session::{ChatSession, SendOutcome};
use theme::{Theme, ThemeStore};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::chat::clock::SystemClock;
use crate::cli::chat::timer::{TimerToken, TokioTimer};
use crate::cli::chat::transcript::{HtmlTranscript, TerminalTranscript};
use crate::config::ChatConfig;

const WELCOME_TEXT: &str = cstr!(
    "
<bold>Hi, I'm your chat buddy.</bold> Ask me anything.

Things to try
• What time is it?
• Tell me a joke
• Can you explain more?

<dim>End a line with \\ to keep typing on the next line.</dim>

/help         Show the help dialogue
/quit         Quit the application
"
);

const HELP_TEXT: &str = cstr!(
    "
<bold>Chat Buddy</bold>

/context      Print the conversation so far as JSON
/theme        Toggle between the light and dark theme
/theme dark   Switch to a specific theme (light or dark)
/help         Show this help dialogue
/quit         Quit the application
"
);

type LiveSession = ChatSession<TokioTimer, SystemClock>;

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    config: ChatConfig,
    theme_store: ThemeStore,
    theme: Theme,
    html_path: Option<PathBuf>,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        config: ChatConfig,
        theme: Theme,
    ) -> Self {
        let theme_store = ThemeStore::new(config.theme_file.clone());
        Self {
            output,
            input,
            interactive,
            config,
            theme_store,
            theme,
            html_path: None,
        }
    }

    /// Also write the transcript as HTML list items to `path`.
    pub fn with_html_transcript(mut self, path: PathBuf) -> Self {
        self.html_path = Some(path);
        self
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        let (timer, mut expired) = TokioTimer::new();
        let mut session = ChatSession::new(&self.config, timer, SystemClock);
        session.add_transcript(Box::new(TerminalTranscript::new(io::stdout(), self.theme)));
        if let Some(path) = &self.html_path {
            let file = File::create(path)?;
            session.add_transcript(Box::new(HtmlTranscript::new(BufWriter::new(file))));
            info!("Mirroring transcript to {}", path.display());
        }

        // Handle non-interactive mode (single message)
        if let Some(input) = self.input.take() {
            if !self.send(&mut session, &input)? {
                return Ok(ExitCode::FAILURE);
            }
            while session.is_waiting() {
                match expired.recv().await {
                    Some(token) => {
                        session.on_timer(token);
                    }
                    None => break,
                }
            }
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive(&mut session, &mut expired).await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(
        &mut self,
        session: &mut LiveSession,
        expired: &mut mpsc::UnboundedReceiver<TimerToken>,
    ) -> Result<()> {
        let mut composer = spawn_composer(generate_prompt(None));

        loop {
            tokio::select! {
                event = composer.recv() => match event {
                    Some(ComposerEvent::Line(line)) => match self.handle_input(session, &line) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => writeln!(self.output, "Error: {}", e)?,
                    },
                    Some(ComposerEvent::Failed(e)) => {
                        writeln!(self.output, "Error: {}", e)?;
                        break;
                    }
                    Some(ComposerEvent::Closed) | None => break,
                },
                Some(token) = expired.recv() => {
                    session.on_timer(token);
                }
            }
        }

        debug!("Leaving interactive chat");
        Ok(())
    }

    /// Returns `false` once the user asked to quit.
    fn handle_input(&mut self, session: &mut LiveSession, input: &str) -> Result<bool> {
        match Command::parse(input) {
            Command::Help => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            Command::Quit => return Ok(false),
            Command::Theme(theme) => {
                let theme = theme.unwrap_or_else(|| self.theme.toggled());
                self.apply_theme(session, theme);
                writeln!(self.output, "Theme set to {}.", theme)?;
            }
            Command::Context => {
                let context = serde_json::to_string_pretty(&session.get_context())?;
                writeln!(self.output, "{}", context)?;
            }
            Command::Unknown(name) => {
                writeln!(self.output, "Unknown command {}. Type /help to see what's available.", name)?;
            }
            Command::Invalid(reason) => {
                writeln!(self.output, "Error: {}", reason)?;
            }
            Command::Message(text) => {
                self.send(session, &text)?;
            }
        }

        Ok(true)
    }

    /// Send one message, nudging the user when it was blank.
    fn send(&mut self, session: &mut LiveSession, text: &str) -> Result<bool> {
        match session.send_message(text) {
            SendOutcome::Rejected => {
                // Terminal bell stands in for the composer shake.
                write!(self.output, "\x07")?;
                writeln!(self.output, "(empty message, type something first)")?;
                Ok(false)
            }
            SendOutcome::Scheduled { delay } => {
                debug!("Buddy is typing for {:?}", delay);
                Ok(true)
            }
        }
    }

    fn apply_theme(&mut self, session: &mut LiveSession, theme: Theme) {
        self.theme = theme;
        session.set_theme(theme);
        if let Err(e) = self.theme_store.save(theme) {
            warn!("Theme not saved: {}", e);
        }
    }
}
