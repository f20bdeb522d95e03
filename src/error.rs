use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the chat session and its presentation layer.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to write theme file {path}: {source}")]
    ThemeStore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} is not a number of milliseconds")]
    InvalidDelay { key: &'static str, value: String },

    #[error("Unknown theme {0:?}, expected \"light\" or \"dark\"")]
    UnknownTheme(String),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
