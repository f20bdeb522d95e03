use chrono::{DateTime, Local};
use regex::Regex;
use tracing::debug;

use super::clock::TimeFormat;
use super::conversation_log::{ConversationLog, Role};

pub const GREETING_REPLY: &str =
    "Hi there! Could you tell me a little more about what you need help with? 😊";
pub const HELP_REPLY: &str =
    "Sure — can you describe the issue in one or two sentences? I can suggest steps or resources.";
pub const JOKE_REPLY: &str =
    "Why did the developer go broke? Because he used up all his cache. 😄 Want another one?";
pub const EXPAND_WITHOUT_CONTEXT_REPLY: &str = "Could you say which part you want more detail on?";
pub const GENERIC_REPLY: &str = "I might not have all the details on that, but I can help reason it out or ask a clarifying question — could you tell me more?";
pub const CONTEXT_REPLY: &str =
    "Thanks for asking — can you give a bit more context so I can give a useful answer?";
pub const REPEAT_SUFFIX: &str = " (also, feel free to ask me to expand)";

const GREETINGS: &[&str] = &["hi", "hello", "hey", "hya"];
const SHORT_INPUT_CHARS: usize = 3;
const LONG_INPUT_WORDS: usize = 8;

/// Everything a rule may look at when producing a reply.
pub struct ReplyInput<'a> {
    /// Lower-cased user text, untrimmed.
    pub lower: &'a str,
    pub log: &'a ConversationLog,
    pub now: DateTime<Local>,
    pub format: &'a TimeFormat,
}

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Producer = Box<dyn Fn(&ReplyInput<'_>) -> String + Send + Sync>;

/// A named (predicate, producer) pair.
pub struct Rule {
    pub name: &'static str,
    matches: Predicate,
    produce: Producer,
}

impl Rule {
    pub fn new<M, P>(name: &'static str, matches: M, produce: P) -> Self
    where
        M: Fn(&str) -> bool + Send + Sync + 'static,
        P: Fn(&ReplyInput<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            name,
            matches: Box::new(matches),
            produce: Box::new(produce),
        }
    }

    /// Rule firing when any of `words` appears as a whole word or phrase.
    pub fn on_words<P>(name: &'static str, words: &[&str], produce: P) -> Self
    where
        P: Fn(&ReplyInput<'_>) -> String + Send + Sync + 'static,
    {
        let pattern = word_pattern(words);
        Self::new(name, move |lower| pattern.is_match(lower), produce)
    }
}

fn word_pattern(words: &[&str]) -> Regex {
    let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    // Built from escaped literals, so it always compiles.
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
        .unwrap_or_else(|e| unreachable!("invalid word pattern: {e}"))
}

/// Scripted reply selection: ordered rules, first match wins, followed by a
/// repeat check against the previous computed reply.
pub struct ReplyEngine {
    rules: Vec<Rule>,
    format: TimeFormat,
    last_reply: Option<String>,
}

impl ReplyEngine {
    pub fn new(format: TimeFormat) -> Self {
        Self {
            rules: default_rules(),
            format,
            last_reply: None,
        }
    }

    /// The most recently computed reply, delivered or not.
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    pub fn compute_reply(
        &mut self,
        user_text: &str,
        log: &ConversationLog,
        now: DateTime<Local>,
    ) -> String {
        let reply = vary_response(self.select(user_text, log, now), self.last_reply.as_deref());
        self.last_reply = Some(reply.clone());
        reply
    }

    fn select(&self, user_text: &str, log: &ConversationLog, now: DateTime<Local>) -> String {
        let lower = user_text.to_lowercase();
        let input = ReplyInput {
            lower: &lower,
            log,
            now,
            format: &self.format,
        };

        for rule in &self.rules {
            if (rule.matches)(&lower) {
                debug!("Reply rule matched: {}", rule.name);
                return (rule.produce)(&input);
            }
        }

        debug!("No reply rule matched, using fallback");
        fallback(user_text)
    }
}

fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new("greeting", is_greeting_or_short, |_| GREETING_REPLY.to_string()),
        Rule::on_words("time", &["time", "what time", "current time"], |input| {
            format!(
                "The current time is {}. Would you like help with timezones or scheduling?",
                input.format.time(&input.now)
            )
        }),
        Rule::on_words("date", &["date", "today", "what day"], |input| {
            format!(
                "Today is {}. Anything else I can help with?",
                input.format.date(&input.now)
            )
        }),
        Rule::on_words("help", &["help", "problem", "issue", "support"], |_| {
            HELP_REPLY.to_string()
        }),
        Rule::on_words("joke", &["joke", "funny"], |_| JOKE_REPLY.to_string()),
        Rule::on_words("expand", &["detail", "explain", "more", "expand"], |input| {
            match input.log.find_last_by_role(Role::Bot) {
                Some(last) => format!(
                    "Sure — here are more details: {} If you want, I can give an example or step-by-step instructions.",
                    last.text
                ),
                None => EXPAND_WITHOUT_CONTEXT_REPLY.to_string(),
            }
        }),
    ]
}

/// Length is measured on the text as typed, the greeting match on the trimmed text.
fn is_greeting_or_short(lower: &str) -> bool {
    lower.chars().count() <= SHORT_INPUT_CHARS || GREETINGS.contains(&lower.trim())
}

fn fallback(user_text: &str) -> String {
    let trimmed = user_text.trim();
    let punctuated = trimmed.ends_with(['?', '.', '!']);
    if punctuated || trimmed.split_whitespace().count() > LONG_INPUT_WORDS {
        format!("Good question — {}", GENERIC_REPLY)
    } else {
        CONTEXT_REPLY.to_string()
    }
}

fn vary_response(reply: String, previous: Option<&str>) -> String {
    if previous == Some(reply.as_str()) {
        reply + REPEAT_SUFFIX
    } else {
        reply
    }
}
