//! formloop - human-in-the-loop form filling
//!
//! formloop reads a form, extracts its fields, and answers one question per
//! field against an index of a source document. The drafted answers are shown
//! to a person, whose feedback re-asks only the fields it concerns, until the
//! draft is accepted.
//!
//! formloop can be used in two ways:
//! - **CLI**: `formloop run --source resume.txt --form application.md`
//! - **Library**: build an [`Engine`] with your own [`Collaborators`] and drive
//!   [`RunHandle`]s yourself
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use formloop::{Config, Engine, EngineOptions, RunOutcome};
//! use formloop::adapters::{LlmSettings, llm_collaborators};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::builder().workers(2).build()?;
//! let backend = formloop::llm::from_config(&config)?;
//! let collaborators = llm_collaborators(backend, LlmSettings::from_config(&config));
//! let engine = Engine::new(collaborators, EngineOptions::from_config(&config))?;
//!
//! let mut run = engine.start("resume.txt", "application.md")?;
//! let mut outcome = run.next_suspension_or_result().await;
//! while let RunOutcome::Suspended { draft, .. } = &outcome {
//!     println!("{draft}");
//!     outcome = run.resume("looks good").await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`Engine`], [`EngineOptions`] - run construction
//! - [`RunHandle`], [`RunOutcome`], [`RunState`] - driving a run
//! - [`Collaborators`] and its traits - pluggable extraction, indexing,
//!   answering and decisions
//! - [`SessionRegistry`], [`SnapshotStore`], [`RunSnapshot`] - sessions
//! - [`Config`], [`ConfigBuilder`], [`CliArgs`] - configuration
//! - [`FormloopError`], [`RunError`], [`ExitCode`] - errors
//!
//! Internal modules are accessible via module paths but are marked
//! `#[doc(hidden)]` and are not covered by semver stability guarantees.

// ============================================================================
// Stable Public API
// ============================================================================

/// Shared machinery for starting and rehydrating runs.
pub use formloop_engine::{Engine, EngineOptions};

/// Caller-facing run state machine.
///
/// A handle does work only inside
/// [`next_suspension_or_result`](RunHandle::next_suspension_or_result) and
/// [`resume`](RunHandle::resume).
pub use formloop_engine::{EventStream, RunHandle, RunOutcome, RunState};

/// Events observed on a run's [`EventStream`].
pub use formloop_engine::{Event, EventKind};

/// Pluggable collaborators consulted by the workflow steps.
pub use formloop_engine::{
    Collaborators, DecisionOracle, DocumentIndexer, FormFieldExtractor, IndexHandle,
    QueryAnswerer,
};

/// Live sessions and on-disk snapshots of suspended runs.
pub use formloop_engine::{RunSnapshot, SessionRegistry, SnapshotStore};

/// Replies that accept a draft without consulting the decision oracle.
pub use formloop_engine::{ACCEPTANCE_TOKENS, is_acceptance};

/// Hierarchical configuration: CLI arguments > config file > defaults.
pub use formloop_config::{CliArgs, Config, ConfigBuilder};

/// Top-level error with user-facing rendering and exit code mapping.
pub use formloop_utils::error::FormloopError;

pub use formloop_utils::error::{ErrorCategory, RunError, RunErrorKind, UserFriendlyError};

/// Stable process exit codes.
pub use formloop_utils::exit_codes::ExitCode;

// ============================================================================
// Internal modules - accessible but not stable
// ============================================================================

#[doc(hidden)]
pub use formloop_engine::adapters;

#[doc(hidden)]
pub use formloop_llm as llm;

#[doc(hidden)]
pub use formloop_utils::{fingerprint, logging, paths};

#[doc(hidden)]
pub mod cli;
