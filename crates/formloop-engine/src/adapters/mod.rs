//! Model-backed collaborators built on `formloop-llm`.

mod fields;
mod lexical;
mod oracle;

use std::sync::Arc;
use std::time::Duration;

use formloop_config::Config;
use formloop_llm::{LlmBackend, LlmInvocation, Message};
use formloop_utils::error::RunError;

use crate::collaborators::Collaborators;

pub use fields::{LlmFieldExtractor, parse_fields_response, strip_code_fences};
pub use lexical::{LexicalAnswerer, LexicalIndex, LexicalIndexer, TOP_K};
pub use oracle::LlmDecisionOracle;

/// Model name and per-call timeout shared by the adapters.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Empty means the backend's default model.
    pub model: String,
    pub timeout: Duration,
}

impl LlmSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm_model().to_string(),
            timeout: config.llm_timeout(),
        }
    }
}

/// The standard collaborator set over one backend.
#[must_use]
pub fn llm_collaborators(backend: Arc<dyn LlmBackend>, settings: LlmSettings) -> Collaborators {
    Collaborators {
        extractor: Arc::new(LlmFieldExtractor::new(Arc::clone(&backend), settings.clone())),
        indexer: Arc::new(LexicalIndexer::new()),
        answerer: Arc::new(LexicalAnswerer::new(Arc::clone(&backend), settings.clone())),
        oracle: Arc::new(LlmDecisionOracle::new(backend, settings)),
    }
}

/// Single completion; backend failures become collaborator errors.
async fn complete(
    backend: &dyn LlmBackend,
    settings: &LlmSettings,
    purpose: &'static str,
    messages: Vec<Message>,
) -> Result<String, RunError> {
    let invocation = LlmInvocation::new(purpose, settings.model.clone(), settings.timeout, messages);
    backend
        .invoke(invocation)
        .await
        .map(|result| result.raw_response)
        .map_err(|e| RunError::collaborator(purpose, e))
}
