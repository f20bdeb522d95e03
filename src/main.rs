use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chat_buddy::cli::chat::theme::{Theme, ThemeStore};
use chat_buddy::cli::chat::ChatContext;
use chat_buddy::ChatConfig;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    options: ChatOptions,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatOptions),
}

#[derive(Args, Clone, Default)]
struct ChatOptions {
    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Switch to this theme (light or dark) and remember it
    #[arg(long)]
    theme: Option<Theme>,

    /// Also write the transcript as HTML to this file
    #[arg(long, value_name = "PATH")]
    html: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let options = match cli.command {
        Some(Commands::Chat(options)) => options,
        None => cli.options,
    };

    let log_level = if options.verbose { Level::DEBUG } else { Level::INFO };

    // Logs go to stderr so they never interleave with the transcript on stdout.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting chat buddy");

    let config = ChatConfig::from_env()?;
    let theme_store = ThemeStore::new(config.theme_file.clone());
    let theme = match options.theme {
        Some(theme) => {
            theme_store.save(theme)?;
            theme
        }
        None => theme_store.load(),
    };

    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        options.input,
        true,
        config,
        theme,
    );
    if let Some(path) = options.html {
        chat_context = chat_context.with_html_transcript(path);
    }
    chat_context.run().await
}
