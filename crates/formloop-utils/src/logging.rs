//! Tracing setup and structured log helpers.
//!
//! Every run logs under a `run` span carrying the session id; round-level
//! helpers attach `round`, `field` and `duration_ms` fields so a single
//! session can be followed with `RUST_LOG=formloop=debug`.

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise verbose mode enables debug output for
/// the formloop crates and span close events with timings.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("formloop=debug,formloop_engine=debug,formloop_llm=debug,info")
            } else {
                EnvFilter::try_new("formloop=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span wrapping all engine work for one session.
pub fn run_span(session: &str) -> tracing::Span {
    span!(Level::INFO, "run", session = %session)
}

pub fn log_round_start(session: &str, round: u32, targets: &[String]) {
    info!(
        session = %session,
        round = round,
        target_count = targets.len(),
        fields = ?targets,
        "Starting query round"
    );
}

pub fn log_round_complete(session: &str, round: u32, answered: usize, duration_ms: u128) {
    info!(
        session = %session,
        round = round,
        answered = answered,
        duration_ms = %duration_ms,
        "Query round complete"
    );
}

/// Log a fatal run error with the failure kind as a structured field.
pub fn log_run_error(session: &str, kind: &str, error: &str) {
    error!(
        session = %session,
        kind = %kind,
        error = %error,
        "Run terminated with error"
    );
}
