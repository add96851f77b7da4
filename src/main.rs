//! # Converse CLI (`converse`)
//!
//! Chat with a set of PDFs, in the browser or from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! converse --config ./config/converse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `converse serve` | Start the web UI |
//! | `converse ask <pdf>... -q "<question>"` | Answer questions about PDFs |
//! | `converse extract <pdf>...` | Show extracted chunks (no network) |
//! | `converse completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Web UI on the configured bind address
//! OPENAI_API_KEY=sk-... converse serve
//!
//! # Two questions, one conversation
//! converse ask reports/ -q "What was Q3 revenue?" -q "And Q4?"
//!
//! # Check what the chunker sees
//! converse extract report.pdf --json
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use converse::progress::ProgressMode;
use converse::{commands, config, logging, server};

/// Converse: chat with multiple PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/converse.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "converse",
    about = "Converse: ask questions about your PDFs",
    version,
    long_about = "Converse extracts text from PDFs, indexes it with embeddings, and answers \
    questions with a language model, citing the pages each answer came from."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/converse.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/converse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI.
    ///
    /// Binds to `[server].bind` unless `--bind` is given.
    Serve {
        /// Override the bind address (e.g. `0.0.0.0:8501`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Process PDFs and answer questions about them.
    ///
    /// Questions are asked in order within one conversation, so later
    /// questions can refer to earlier answers.
    Ask {
        /// PDF files or directories containing PDFs.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Question to ask. Repeat for follow-ups.
        #[arg(short, long = "question", required = true)]
        questions: Vec<String>,

        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Extract and chunk PDFs without calling any provider.
    Extract {
        /// PDF files or directories containing PDFs.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "converse", &mut std::io::stdout());
        return Ok(());
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg).await?;
        }
        Commands::Ask {
            paths,
            questions,
            progress,
        } => {
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            commands::run_ask(&cfg, &paths, &questions, reporter.as_ref()).await?;
        }
        Commands::Extract {
            paths,
            json,
            progress,
        } => {
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            commands::run_extract(&cfg, &paths, json, reporter.as_ref()).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
