//! Engine construction and run entry points.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

use formloop_config::{
    Config, DEFAULT_PROMPT, DEFAULT_ROUTING_THRESHOLD, DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_WORKERS,
};
use formloop_utils::error::RunError;
use formloop_utils::paths::is_valid_session_id;

use crate::cache::IndexCache;
use crate::collaborators::Collaborators;
use crate::context::{ContextStore, keys};
use crate::dispatcher::{Dispatcher, StepRegistry};
use crate::event::Event;
use crate::handle::{RunHandle, RunSnapshot, SNAPSHOT_VERSION};
use crate::steps::{self, StepSettings};

/// Engine-wide settings, normally derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub run_timeout: Duration,
    pub workers: usize,
    pub routing_threshold: u8,
    pub acceptance_bypass: bool,
    pub prompt: String,
    pub cache_dir: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
            routing_threshold: DEFAULT_ROUTING_THRESHOLD,
            acceptance_bypass: true,
            prompt: DEFAULT_PROMPT.to_string(),
            cache_dir: formloop_utils::paths::cache_dir().into_std_path_buf(),
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_timeout: config.run_timeout(),
            workers: config.workers(),
            routing_threshold: config.routing_threshold(),
            acceptance_bypass: config.acceptance_bypass(),
            prompt: config.prompt().to_string(),
            cache_dir: config.cache_dir(),
        }
    }
}

/// Shared, immutable machinery for starting runs. Each run gets its own
/// [`RunHandle`]; the engine itself holds no per-run state.
pub struct Engine {
    options: EngineOptions,
    cache: Arc<IndexCache>,
    dispatcher: Arc<Dispatcher>,
    next_run: AtomicU64,
}

impl Engine {
    pub fn new(collaborators: Collaborators, options: EngineOptions) -> Result<Self, RunError> {
        let cache = Arc::new(IndexCache::new(options.cache_dir.clone()));
        let settings = StepSettings {
            routing_threshold: options.routing_threshold,
            acceptance_bypass: options.acceptance_bypass,
            prompt: options.prompt.clone(),
        };

        let mut registry = StepRegistry::new();
        steps::register_all(&mut registry, &collaborators, Arc::clone(&cache), &settings)?;

        info!(
            workers = options.workers,
            run_timeout_secs = options.run_timeout.as_secs(),
            routing_threshold = options.routing_threshold,
            acceptance_bypass = options.acceptance_bypass,
            cache_dir = %options.cache_dir.display(),
            "Engine ready"
        );

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(registry, options.workers)),
            cache,
            options,
            next_run: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Start a run under a generated session id.
    pub fn start(
        &self,
        source_path: impl AsRef<Path>,
        form_path: impl AsRef<Path>,
    ) -> Result<RunHandle, RunError> {
        let n = self.next_run.fetch_add(1, Ordering::Relaxed);
        let session_id = format!("run-{}-{n}", chrono::Utc::now().format("%Y%m%d%H%M%S"));
        self.start_session(&session_id, source_path, form_path)
    }

    /// Start a run for `session_id`. Nothing executes until the handle is
    /// first observed.
    pub fn start_session(
        &self,
        session_id: &str,
        source_path: impl AsRef<Path>,
        form_path: impl AsRef<Path>,
    ) -> Result<RunHandle, RunError> {
        if !is_valid_session_id(session_id) {
            return Err(RunError::MissingInput {
                what: format!("valid session id (got '{session_id}')"),
            });
        }
        let source_path = require_input("source document", source_path.as_ref())?;
        let form_path = require_input("form", form_path.as_ref())?;

        let mut ctx = ContextStore::new();
        ctx.set(keys::SESSION_ID, session_id)?;

        info!(session = %session_id, source = %source_path, form = %form_path, "Starting run");
        Ok(RunHandle::new(
            session_id.to_string(),
            ctx,
            Arc::clone(&self.dispatcher),
            Event::Start {
                source_path,
                form_path,
            },
            self.options.run_timeout,
        ))
    }

    /// Rebuild a suspended run from a snapshot taken by [`RunHandle::snapshot`].
    pub fn rehydrate(&self, snapshot: RunSnapshot) -> Result<RunHandle, RunError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RunError::InvalidResume {
                state: format!("snapshot version {}", snapshot.version),
            });
        }
        if snapshot.context.fields().is_empty() {
            return Err(RunError::InvalidResume {
                state: "snapshot without extracted fields".to_string(),
            });
        }
        info!(session = %snapshot.session_id, round = snapshot.round, "Rehydrating run");
        Ok(RunHandle::from_snapshot(
            snapshot,
            Arc::clone(&self.dispatcher),
            self.options.run_timeout,
        ))
    }
}

fn require_input(what: &str, path: &Path) -> Result<String, RunError> {
    if path.as_os_str().is_empty() {
        return Err(RunError::MissingInput {
            what: format!("{what} path"),
        });
    }
    if !path.is_file() {
        return Err(RunError::MissingInput {
            what: format!("{what} at {}", path.display()),
        });
    }
    Ok(path.display().to_string())
}
