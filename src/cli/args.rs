//! CLI argument definitions (clap derive).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::CliArgs;

/// formloop - fill a form from a source document, one feedback round at a time
#[derive(Parser, Debug)]
#[command(name = "formloop")]
#[command(about = "Fill a form from a source document with human feedback rounds")]
#[command(long_about = r#"
formloop reads a form, asks a question per field against an index of the
source document, and shows you the drafted answers. Reply with feedback to
re-ask the affected fields, or accept the draft to finish.

EXAMPLES:
  # Fill a form interactively
  formloop run --source resume.pdf.txt --form application.md

  # Keep the run resumable; EOF while waiting saves a snapshot
  formloop run --source resume.txt --form application.md --session intake-7

  # Answer a saved run later
  formloop resume --session intake-7 "the last name is Lin"

  # Show the cache key for a document
  formloop fingerprint resume.txt

  # Show effective configuration and where each value came from
  formloop config

CONFIGURATION:
  Precedence: CLI flags > config file > defaults.
  The config file is discovered by searching upward from CWD for
  .formloop/config.toml; use --config to point at one explicitly.

Replies "done", "ok", "okay", "looks good", "final" and "good to go" accept
the current draft.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model used by the LLM collaborators
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Directory for cached document indexes
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Directory for suspended-run snapshots
    #[arg(long, global = true)]
    pub sessions_dir: Option<PathBuf>,

    /// Enable verbose logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start a run and answer its feedback prompts from stdin
    Run {
        /// Source document to answer questions from
        #[arg(long)]
        source: PathBuf,

        /// Form whose fields should be filled
        #[arg(long)]
        form: PathBuf,

        /// Session id; makes the run resumable after EOF
        #[arg(long)]
        session: Option<String>,

        /// Maximum engine time for the run, in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Feedback routing threshold (0-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// Concurrent field queries
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Answer a saved run once and save it again if it is still waiting
    Resume {
        /// Session id given to `formloop run --session`
        #[arg(long)]
        session: String,

        /// Feedback or an acceptance reply
        feedback: String,
    },

    /// Print the cache key (BLAKE3 hex) of a file
    Fingerprint {
        file: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Overrides for [`crate::Config::discover`], including run-only flags.
    #[must_use]
    pub fn cli_args(&self) -> CliArgs {
        let mut args = CliArgs {
            config_path: self.config.clone(),
            model: self.model.clone(),
            cache_dir: self.cache_dir.clone(),
            sessions_dir: self.sessions_dir.clone(),
            ..CliArgs::default()
        };
        if let Commands::Run {
            timeout,
            threshold,
            workers,
            ..
        } = &self.command
        {
            args.run_timeout_secs = *timeout;
            args.routing_threshold = *threshold;
            args.workers = *workers;
        }
        args
    }
}
