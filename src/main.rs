//! # docqa CLI
//!
//! Ask questions about PDF documents from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa session` | Interactive session: upload PDFs, ask questions, browse history |
//! | `docqa ask --file a.pdf "question"` | Upload, answer one question, exit |
//! | `docqa history` | Show recent questions and answers |
//! | `docqa inspect --file a.pdf` | Show how files would be paged and chunked (no API calls) |
//! | `docqa init` | Create the history store |
//!
//! The API key is always read interactively (masked) or from the first line
//! of stdin. It is never read from the config file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use docqa::config;
use docqa::progress::ProgressMode;
use docqa::{commands, surface};

/// docqa: question answering over uploaded PDF documents.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Ask questions about PDF documents using retrieval and a chat model",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml`. If the file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    /// Log debug output to stderr (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session.
    Session {
        /// PDF files to upload before the prompt appears.
        #[arg(long = "file", short = 'f')]
        files: Vec<PathBuf>,
    },

    /// Upload files, answer a single question and exit.
    Ask {
        /// PDF files to upload.
        #[arg(long = "file", short = 'f', required = true)]
        files: Vec<PathBuf>,

        /// The question.
        question: String,
    },

    /// Show question/answer history.
    History {
        /// Maximum number of entries (default: `history.display_limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Rank entries by similarity to this text instead of recency.
        #[arg(long)]
        like: Option<String>,
    },

    /// Show pages and chunks for files without calling any service.
    Inspect {
        #[arg(long = "file", short = 'f', required = true)]
        files: Vec<PathBuf>,

        /// Print the chunks as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create the history store. Safe to run repeatedly.
    Init,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::load_or_default(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Session { files } => {
            surface::run_session(cfg, progress, &files).await?;
        }
        Commands::Ask { files, question } => {
            commands::run_ask(cfg, &files, &question, progress).await?;
        }
        Commands::History { limit, like } => {
            commands::run_history(&cfg, limit, like.as_deref()).await?;
        }
        Commands::Inspect { files, json } => {
            commands::run_inspect(&cfg, &files, json)?;
        }
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
    }

    Ok(())
}
