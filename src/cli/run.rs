//! CLI entry point and dispatch.
//!
//! `run()` prints everything, errors included; `main` only maps the returned
//! code to the process exit status.

use clap::Parser;

use super::args::{Cli, Commands};
use super::commands;
use crate::{Config, ExitCode, FormloopError};
use formloop_utils::logging::init_tracing;

pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("warning: logging unavailable: {e}");
    }

    let config = match Config::discover(&cli.cli_args()) {
        Ok(config) => config,
        Err(err) => {
            let err = FormloopError::from(err);
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        match &cli.command {
            Commands::Run {
                source,
                form,
                session,
                ..
            } => commands::execute_run_command(source, form, session.as_deref(), &config).await,
            Commands::Resume { session, feedback } => {
                commands::execute_resume_command(session, feedback, &config).await
            }
            Commands::Fingerprint { file } => commands::execute_fingerprint_command(file),
            Commands::Config { json } => commands::execute_config_command(&config, *json),
        }
    });

    if let Err(error) = result {
        if let Some(err) = error.downcast_ref::<FormloopError>() {
            eprintln!("{}", err.display_for_user());
            return Err(err.to_exit_code());
        }
        eprintln!("✗ Unexpected error: {error:#}");
        eprintln!("\n  Run with --verbose for more detailed output");
        return Err(ExitCode::INTERNAL);
    }

    Ok(())
}
