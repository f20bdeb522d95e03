use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ChatError, ConfigError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(ConfigError::UnknownTheme(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ThemeFile {
    theme: Theme,
}

/// Remembers the theme between runs as a small JSON file.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Saved theme, or light when nothing usable is stored.
    pub fn load(&self) -> Theme {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No saved theme at {}: {}", self.path.display(), e);
                return Theme::default();
            }
        };

        match serde_json::from_str::<ThemeFile>(&contents) {
            Ok(file) => file.theme,
            Err(e) => {
                warn!("Ignoring unreadable theme file {}: {}", self.path.display(), e);
                Theme::default()
            }
        }
    }

    pub fn save(&self, theme: Theme) -> Result<()> {
        let store_err = |source: std::io::Error| ChatError::ThemeStore {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(store_err)?;
        }
        let json = serde_json::to_string_pretty(&ThemeFile { theme })?;
        fs::write(&self.path, json).map_err(store_err)?;
        debug!("Saved theme {} to {}", theme, self.path.display());
        Ok(())
    }
}
