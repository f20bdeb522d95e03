use std::borrow::Cow;
use std::io::Write;

use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};

use super::conversation_log::Role;
use super::theme::Theme;
use crate::error::Result;

/// A finalized message handed to transcripts. `text` is raw; each transcript
/// escapes it for its own medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage<'a> {
    pub role: Role,
    pub text: &'a str,
    /// Already formatted for display (`HH:MM` by default).
    pub time: String,
    pub animate: bool,
}

/// Somewhere finalized messages are displayed.
pub trait Transcript {
    fn render(&mut self, message: &RenderedMessage<'_>) -> Result<()>;

    fn set_theme(&mut self, _theme: Theme) {}
}

/// Escape the five HTML-significant characters.
pub fn escape_html(unsafe_text: &str) -> Cow<'_, str> {
    if !unsafe_text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(unsafe_text);
    }

    let mut escaped = String::with_capacity(unsafe_text.len() + 16);
    for c in unsafe_text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Drop control characters (escape sequences included) except newlines and tabs.
pub fn sanitize_terminal(text: &str) -> Cow<'_, str> {
    let unsafe_char = |c: char| c.is_control() && c != '\n' && c != '\t';
    if !text.chars().any(unsafe_char) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().filter(|&c| !unsafe_char(c)).collect())
}

struct Palette {
    user: Color,
    bot: Color,
    time: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                user: Color::DarkBlue,
                bot: Color::DarkGreen,
                time: Color::DarkGrey,
            },
            Theme::Dark => Self {
                user: Color::Cyan,
                bot: Color::Green,
                time: Color::Grey,
            },
        }
    }
}

/// Coloured chat bubbles on a terminal.
pub struct TerminalTranscript<W: Write> {
    output: W,
    palette: Palette,
}

impl<W: Write> TerminalTranscript<W> {
    pub fn new(output: W, theme: Theme) -> Self {
        Self {
            output,
            palette: Palette::for_theme(theme),
        }
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Transcript for TerminalTranscript<W> {
    fn render(&mut self, message: &RenderedMessage<'_>) -> Result<()> {
        let (label, color) = match message.role {
            Role::User => ("you", self.palette.user),
            Role::Bot => ("buddy", self.palette.bot),
        };
        let text = sanitize_terminal(message.text);
        let body = text.replace('\n', "\n        ");

        queue!(
            self.output,
            SetForegroundColor(self.palette.time),
            Print(format!("[{}] ", message.time)),
            SetForegroundColor(color),
            SetAttribute(Attribute::Bold),
            Print(format!("{label}: ")),
            SetAttribute(Attribute::Reset),
            SetForegroundColor(color),
            Print(body),
            ResetColor,
            Print("\n"),
        )?;
        self.output.flush()?;
        Ok(())
    }

    fn set_theme(&mut self, theme: Theme) {
        self.palette = Palette::for_theme(theme);
    }
}

/// Mirrors the transcript as `<li>` message items, one per line.
pub struct HtmlTranscript<W: Write> {
    output: W,
}

impl<W: Write> HtmlTranscript<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }
}

impl<W: Write> Transcript for HtmlTranscript<W> {
    fn render(&mut self, message: &RenderedMessage<'_>) -> Result<()> {
        let style = if message.animate {
            ""
        } else {
            r#" style="animation:none;opacity:1""#
        };
        writeln!(
            self.output,
            r#"<li class="message {}"{}><div class="meta"><div class="text">{}</div><div class="time">{}</div></div></li>"#,
            message.role,
            style,
            escape_html(message.text),
            escape_html(&message.time),
        )?;
        self.output.flush()?;
        Ok(())
    }
}
