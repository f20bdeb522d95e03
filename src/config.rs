use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::cli::chat::scheduler::DelayPolicy;
use crate::error::ConfigError;

pub const BASE_DELAY_VAR: &str = "CHAT_BUDDY_BASE_DELAY_MS";
pub const PER_CHAR_DELAY_VAR: &str = "CHAT_BUDDY_PER_CHAR_DELAY_MS";
pub const MAX_DELAY_VAR: &str = "CHAT_BUDDY_MAX_DELAY_MS";
pub const TIME_FORMAT_VAR: &str = "CHAT_BUDDY_TIME_FORMAT";
pub const DATE_FORMAT_VAR: &str = "CHAT_BUDDY_DATE_FORMAT";
pub const THEME_FILE_VAR: &str = "CHAT_BUDDY_THEME_FILE";

pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";
pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Runtime settings for a chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub delay: DelayPolicy,
    /// `chrono` format used for message timestamps and the time reply.
    pub time_format: String,
    /// `chrono` format used for the date reply.
    pub date_format: String,
    pub theme_file: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            delay: DelayPolicy::default(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            theme_file: default_theme_file(),
        }
    }
}

impl ChatConfig {
    /// Build a config from `CHAT_BUDDY_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_millis(&lookup, BASE_DELAY_VAR)? {
            config.delay.base = ms;
        }
        if let Some(ms) = parse_millis(&lookup, PER_CHAR_DELAY_VAR)? {
            config.delay.per_char = ms;
        }
        if let Some(ms) = parse_millis(&lookup, MAX_DELAY_VAR)? {
            config.delay.max = ms;
        }
        if let Some(format) = lookup(TIME_FORMAT_VAR).filter(|f| !f.trim().is_empty()) {
            config.time_format = format;
        }
        if let Some(format) = lookup(DATE_FORMAT_VAR).filter(|f| !f.trim().is_empty()) {
            config.date_format = format;
        }
        if let Some(path) = lookup(THEME_FILE_VAR).filter(|p| !p.trim().is_empty()) {
            config.theme_file = PathBuf::from(path);
        }

        debug!("Loaded chat config: {:?}", config);
        Ok(config)
    }
}

fn parse_millis<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidDelay { key, value }),
    }
}

fn default_theme_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chat-buddy")
        .join("theme.json")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = ChatConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.delay, DelayPolicy::default());
        assert_eq!(config.time_format, "%H:%M");
        assert!(config.theme_file.ends_with("chat-buddy/theme.json"));
    }

    #[test]
    fn environment_overrides_delays_and_formats() {
        let config = ChatConfig::from_lookup(lookup_from(&[
            (BASE_DELAY_VAR, "10"),
            (PER_CHAR_DELAY_VAR, " 2 "),
            (MAX_DELAY_VAR, "50"),
            (DATE_FORMAT_VAR, "%Y-%m-%d"),
            (THEME_FILE_VAR, "/tmp/theme.json"),
        ]))
        .unwrap();

        assert_eq!(config.delay.base, Duration::from_millis(10));
        assert_eq!(config.delay.per_char, Duration::from_millis(2));
        assert_eq!(config.delay.max, Duration::from_millis(50));
        assert_eq!(config.date_format, "%Y-%m-%d");
        assert_eq!(config.theme_file, PathBuf::from("/tmp/theme.json"));
    }

    #[test]
    fn rejects_non_numeric_delay() {
        let err = ChatConfig::from_lookup(lookup_from(&[(MAX_DELAY_VAR, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDelay { key: MAX_DELAY_VAR, .. }));
    }
}
