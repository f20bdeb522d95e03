use super::theme::Theme;

/// What a submitted composer line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    /// Switch theme; `None` toggles.
    Theme(Option<Theme>),
    Context,
    /// Not a command; hand the text to the session as typed.
    Message(String),
    Unknown(String),
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Message(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        match (name.as_str(), arg) {
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            ("context", _) => Command::Context,
            ("theme", None) => Command::Theme(None),
            ("theme", Some(arg)) => match arg.parse::<Theme>() {
                Ok(theme) => Command::Theme(Some(theme)),
                Err(e) => Command::Invalid(e.to_string()),
            },
            _ => Command::Unknown(format!("/{name}")),
        }
    }
}
