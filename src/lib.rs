pub mod cli;
pub mod config;
pub mod error;

pub use cli::chat::conversation_log::{Message, Role};
pub use cli::chat::session::{AppendOptions, ChatSession, SendOutcome};
pub use config::ChatConfig;
pub use error::{ChatError, ConfigError};
