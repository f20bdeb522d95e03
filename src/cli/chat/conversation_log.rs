use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the conversation. The text is stored exactly as typed;
/// escaping happens when a transcript renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

/// Append-only record of a chat session, oldest first.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn append(&mut self, role: Role, text: &str, timestamp: DateTime<Local>) -> &Message {
        self.messages.push(Message {
            role,
            text: text.to_string(),
            timestamp,
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Owned copy of every message; changes to it never reach the log.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn find_last_by_role(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }
}
