//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands::{self, TranscribeArgs};
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Credential-pool orchestrator for metered speech-to-text transcription
#[derive(Parser)]
#[command(name = "poolscribe")]
#[command(version)]
#[command(
    about = "Transcribe audio against a pool of pre-funded transcription credentials"
)]
#[command(
    long_about = "Transcribe audio files with a metered speech-to-text service, paying per\n\
second of audio from a pool of pre-funded API credentials. Oversized audio is\n\
split into ordered chunks, failed credentials are rotated out, and every job\n\
is recorded in a durable history.\n\n\
EXAMPLES:\n    \
# Transcribe with the fast model and pipe the transcript\n    \
$ poolscribe transcribe meeting.wav | wc -w\n    \
\n    \
# Double transcription: fast and accurate models concurrently\n    \
$ poolscribe transcribe meeting.wav --double\n    \
\n    \
# Strip silences and speed up before transcribing\n    \
$ poolscribe transcribe interview.mp3 --remove-silences --speed 1.5\n    \
\n    \
# Check remaining pool credit and past jobs\n    \
$ poolscribe balances\n    \
$ poolscribe history"
)]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/poolscribe/poolscribe.toml\n    Ledger/history:     ~/.local/share/poolscribe/\n    Logs:               ~/.local/state/poolscribe/poolscribe.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe an audio file against the credential pool
    ///
    /// Pre-processes the audio, splits it into chunks when oversized, and
    /// pays for the transcription from the configured credentials. The
    /// transcript goes to stdout for piping; diagnostics go to stderr.
    #[command(visible_alias = "t")]
    Transcribe {
        /// Path to the audio file to transcribe
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Language code forwarded to the service (default from config)
        #[arg(short, long)]
        language: Option<String>,

        /// Model for single mode: "fast" or "accurate"
        #[arg(short, long, conflicts_with = "double")]
        model: Option<String>,

        /// Run fast and accurate models concurrently
        #[arg(short, long)]
        double: bool,

        /// Strip long silences before transcription
        #[arg(long)]
        remove_silences: bool,

        /// Speed factor applied before transcription (0.25 to 4.0)
        #[arg(long)]
        speed: Option<f64>,

        /// Display name recorded in history (defaults to the file name)
        #[arg(long)]
        alias: Option<String>,

        /// Write the transcript to a file instead of stdout
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<String>,
    },

    /// Show remaining credential balances from the ledger
    #[command(visible_alias = "b")]
    Balances,

    /// View or clear the transcription job history
    #[command(visible_alias = "h")]
    History {
        /// Empty the history
        #[arg(long)]
        clear: bool,

        /// Maximum number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Generate shell completion script
    ///
    /// Examples:
    ///   poolscribe completions bash > poolscribe.bash
    ///   poolscribe completions zsh > _poolscribe
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Completions need neither logging nor config
    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "poolscribe", &mut io::stdout());
        return Ok(());
    }

    logging::init_logging()?;

    match cli.command {
        Commands::Transcribe {
            file,
            language,
            model,
            double,
            remove_silences,
            speed,
            alias,
            output,
        } => {
            commands::handle_transcribe(TranscribeArgs {
                file,
                language,
                model,
                double,
                remove_silences,
                speed,
                alias,
                output,
            })
            .await?;
        }
        Commands::Balances => {
            commands::handle_balances()?;
        }
        Commands::History { clear, limit } => {
            commands::handle_history(clear, limit)?;
        }
        Commands::Completions { .. } => {
            unreachable!("Handled earlier")
        }
    }

    Ok(())
}
