//! Command implementations.
//!
//! Domain errors are converted to [`FormloopError`] before they cross into
//! `anyhow`, so `run()` can recover them for reporting and exit codes.

use anyhow::Result;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use formloop_engine::adapters::{LlmSettings, llm_collaborators};
use formloop_utils::fingerprint::fingerprint_file;

use crate::{
    Config, Engine, EngineOptions, FormloopError, RunError, RunHandle, RunOutcome, SnapshotStore,
};

/// How an interactive session ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveEnd {
    Completed { draft: String },
    /// Input closed while the run was waiting for feedback.
    Detached,
}

/// Show each suspension on `output` and answer it with the next line of
/// `input` until the run completes, fails, or input runs out.
pub async fn drive_interactive<R, W>(
    run: &mut RunHandle,
    input: R,
    output: &mut W,
) -> Result<InteractiveEnd, FormloopError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut outcome = run.next_suspension_or_result().await;
    loop {
        match outcome {
            RunOutcome::Suspended { draft, prompt } => {
                writeln!(output, "\n{draft}\n")?;
                write!(output, "{prompt} ")?;
                output.flush()?;

                let Some(line) = lines.next_line().await? else {
                    writeln!(output)?;
                    return Ok(InteractiveEnd::Detached);
                };
                outcome = run.resume(&line).await?;
            }
            RunOutcome::Completed { draft } => {
                writeln!(output, "\n{draft}")?;
                return Ok(InteractiveEnd::Completed { draft });
            }
            RunOutcome::Failed { error } => return Err(error.into()),
        }
    }
}

/// Engine wired to the configured LLM backend.
fn build_engine(config: &Config) -> Result<Engine, FormloopError> {
    let backend = formloop_llm::from_config(config)?;
    debug!(provider = backend.provider_name(), "LLM backend ready");
    let collaborators = llm_collaborators(backend, LlmSettings::from_config(config));
    Ok(Engine::new(collaborators, EngineOptions::from_config(config))?)
}

fn snapshot_store(config: &Config) -> Result<SnapshotStore, FormloopError> {
    Ok(SnapshotStore::new(config.sessions_dir())?)
}

pub(super) async fn execute_run_command(
    source: &Path,
    form: &Path,
    session: Option<&str>,
    config: &Config,
) -> Result<()> {
    let engine = build_engine(config)?;
    let mut run = match session {
        Some(id) => engine.start_session(id, source, form),
        None => engine.start(source, form),
    }
    .map_err(FormloopError::from)?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let end = drive_interactive(&mut run, stdin, &mut stdout).await?;

    match (end, session) {
        (InteractiveEnd::Completed { .. }, Some(id)) => {
            snapshot_store(config)?
                .delete(id)
                .map_err(FormloopError::from)?;
            println!("✓ Run '{id}' completed");
        }
        (InteractiveEnd::Completed { .. }, None) => {
            println!("✓ Run '{}' completed", run.session_id());
        }
        (InteractiveEnd::Detached, Some(id)) => {
            let snapshot = run.snapshot().map_err(FormloopError::from)?;
            let path = snapshot_store(config)?
                .save(&snapshot)
                .map_err(FormloopError::from)?;
            info!(session = %id, path = %path, "Run suspended to disk");
            println!("Saved run '{id}' at round {}.", snapshot.round);
            println!("Continue with: formloop resume --session {id} \"<feedback>\"");
        }
        (InteractiveEnd::Detached, None) => {
            println!("Input closed; run abandoned. Pass --session to make runs resumable.");
        }
    }
    Ok(())
}

pub(super) async fn execute_resume_command(
    session: &str,
    feedback: &str,
    config: &Config,
) -> Result<()> {
    let store = snapshot_store(config)?;
    let snapshot = store.load(session).map_err(FormloopError::from)?;
    let engine = build_engine(config)?;
    let mut run = engine.rehydrate(snapshot).map_err(FormloopError::from)?;

    match run.resume(feedback).await.map_err(FormloopError::from)? {
        RunOutcome::Suspended { draft, prompt } => {
            store
                .save(&run.snapshot().map_err(FormloopError::from)?)
                .map_err(FormloopError::from)?;
            println!("{draft}\n");
            println!("{prompt}");
        }
        RunOutcome::Completed { draft } => {
            store.delete(session).map_err(FormloopError::from)?;
            println!("{draft}\n");
            println!("✓ Run '{session}' completed");
        }
        RunOutcome::Failed { error } => {
            // A terminated run cannot be resumed again.
            store.delete(session).map_err(FormloopError::from)?;
            return Err(FormloopError::from(error).into());
        }
    }
    Ok(())
}

pub(super) fn execute_fingerprint_command(file: &Path) -> Result<()> {
    if !file.is_file() {
        return Err(FormloopError::from(RunError::MissingInput {
            what: format!("file at {}", file.display()),
        })
        .into());
    }
    let path = Utf8PathBuf::from_path_buf(file.to_path_buf())
        .map_err(|p| anyhow::anyhow!("Path is not valid UTF-8: {}", p.display()))?;
    let digest = fingerprint_file(&path)?;
    println!("{digest}  {path}");
    Ok(())
}

/// Effective values sorted by key, as `(key, value, source)`.
pub(super) fn effective_rows(config: &Config) -> Vec<(String, String, String)> {
    config
        .effective_config()
        .into_iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .map(|(key, (value, source))| (key, value, source))
        .collect()
}

pub(super) fn execute_config_command(config: &Config, json: bool) -> Result<()> {
    let rows = effective_rows(config);
    if json {
        let values: serde_json::Map<String, serde_json::Value> = rows
            .into_iter()
            .map(|(key, value, source)| {
                (key, serde_json::json!({ "value": value, "source": source }))
            })
            .collect();
        let doc = serde_json::json!({
            "config_path": config.config_path.as_ref().map(|p| p.display().to_string()),
            "values": values,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    match &config.config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none found)"),
    }
    println!("\nEffective configuration:");
    for (key, value, source) in rows {
        println!("  {key} = {value} (from {source})");
    }
    Ok(())
}
