use std::thread;

use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{CompletionType, Config, Editor, Helper, Result};
use tokio::sync::mpsc;
use tracing::debug;

use super::command::Command;

const CONTINUATION: &str = "\\\n";

pub fn generate_prompt(custom_prompt: Option<&str>) -> String {
    custom_prompt.unwrap_or("> ").to_string()
}

/// Keeps reading while the current line ends with a backslash, so Enter
/// sends and `\` + Enter starts a new line in the same message.
pub struct ComposerHelper;

impl Completer for ComposerHelper {
    type Candidate = String;
}

impl Hinter for ComposerHelper {
    type Hint = String;
}

impl Highlighter for ComposerHelper {}

impl Validator for ComposerHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> Result<ValidationResult> {
        if ctx.input().ends_with('\\') {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

impl Helper for ComposerHelper {}

pub fn rl() -> Result<Editor<ComposerHelper>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();
    let mut editor = Editor::with_config(config)?;
    editor.set_helper(Some(ComposerHelper));
    Ok(editor)
}

/// Turn the raw editor buffer into the message text.
pub fn compose(buffer: &str) -> String {
    buffer.replace(CONTINUATION, "\n")
}

#[derive(Debug)]
pub enum ComposerEvent {
    Line(String),
    /// Ctrl-C or Ctrl-D.
    Closed,
    Failed(ReadlineError),
}

/// Run the line editor on its own thread, forwarding each submitted message.
/// The thread stops after a quit command, end of input, or an editor error.
pub fn spawn_composer(prompt: String) -> mpsc::UnboundedReceiver<ComposerEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    thread::spawn(move || {
        let mut editor = match rl() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = tx.send(ComposerEvent::Failed(e));
                return;
            }
        };

        loop {
            let event = match editor.readline(&prompt) {
                Ok(buffer) => {
                    if !buffer.trim().is_empty() {
                        editor.add_history_entry(buffer.as_str());
                    }
                    ComposerEvent::Line(compose(&buffer))
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => ComposerEvent::Closed,
                Err(e) => ComposerEvent::Failed(e),
            };

            let stop = match &event {
                ComposerEvent::Line(line) => Command::parse(line) == Command::Quit,
                _ => true,
            };
            if tx.send(event).is_err() || stop {
                debug!("Composer thread finished");
                break;
            }
        }
    });

    rx
}
