//! External capabilities the engine calls into.
//!
//! The engine never talks to a model or parses documents itself; it is handed
//! one implementation of each trait below. `crate::adapters` provides
//! model-backed versions, tests provide stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use formloop_utils::error::RunError;

/// Opaque reference to a published document index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHandle {
    /// Fingerprint of the source bytes the index was built from.
    pub cache_key: String,
    /// Path to the serialized index (`<cache_root>/<key>/index.json`).
    pub artifact_path: PathBuf,
}

#[async_trait]
pub trait FormFieldExtractor: Send + Sync {
    /// Ordered field names found in `form_text`.
    async fn extract_fields(&self, form_text: &str) -> Result<Vec<String>, RunError>;
}

#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    /// Build a serialized retrieval index from raw document bytes.
    async fn index_document(&self, bytes: &[u8]) -> Result<Vec<u8>, RunError>;
}

#[async_trait]
pub trait QueryAnswerer: Send + Sync {
    async fn answer_query(&self, index: &IndexHandle, question: &str) -> Result<String, RunError>;
}

#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Raw verdict token; the engine trims it and compares against
    /// `ACCEPT` / `REVISE`.
    async fn decide(&self, draft: &str, feedback: &str) -> Result<String, RunError>;
}

/// One implementation of each capability, shared by every run of an engine.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn FormFieldExtractor>,
    pub indexer: Arc<dyn DocumentIndexer>,
    pub answerer: Arc<dyn QueryAnswerer>,
    pub oracle: Arc<dyn DecisionOracle>,
}
