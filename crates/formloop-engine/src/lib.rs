//! Event-driven form-filling engine
//!
//! A run is a queue of typed [`Event`]s drained by a [`Dispatcher`]: each
//! event kind has exactly one handler, either sequential (with exclusive
//! access to the run's [`ContextStore`]) or pooled (context-free, executed on
//! a bounded worker pool). The workflow fans out one query per form field,
//! joins the answers at a round-keyed [`BarrierCollector`], and suspends with
//! a draft until the caller resumes the [`RunHandle`] with feedback or an
//! acceptance.
//!
//! ```no_run
//! # async fn demo(engine: formloop_engine::Engine) -> Result<(), formloop_utils::error::RunError> {
//! use formloop_engine::RunOutcome;
//!
//! let mut run = engine.start("resume.txt", "form.md")?;
//! let mut outcome = run.next_suspension_or_result().await;
//! while let RunOutcome::Suspended { draft, prompt } = &outcome {
//!     println!("{draft}\n{prompt}");
//!     outcome = run.resume("looks good").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod barrier;
pub mod cache;
pub mod collaborators;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod event;
pub mod handle;
pub mod merge;
pub mod router;
pub mod session;
pub mod steps;

pub use barrier::BarrierCollector;
pub use cache::{CacheStats, IndexCache};
pub use collaborators::{
    Collaborators, DecisionOracle, DocumentIndexer, FormFieldExtractor, IndexHandle,
    QueryAnswerer,
};
pub use context::ContextStore;
pub use dispatcher::{Dispatcher, DrainOutcome, PooledStep, Step, StepRegistry};
pub use engine::{Engine, EngineOptions};
pub use event::{Event, EventKind};
pub use handle::{
    ACCEPTANCE_TOKENS, EventStream, RunHandle, RunOutcome, RunSnapshot, RunState, is_acceptance,
};
pub use merge::{format_draft, merge_answers};
pub use router::{partial_ratio, route};
pub use session::{SessionRegistry, SnapshotStore};
