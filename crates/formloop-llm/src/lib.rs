//! LLM backend abstraction
//!
//! Providers implement [`LlmBackend`]; the engine's model-backed collaborators
//! hold an `Arc<dyn LlmBackend>` and never see provider details.

mod budgeted_backend;
pub(crate) mod http_client;
mod openai_backend;
mod types;

use std::sync::Arc;

pub use budgeted_backend::BudgetedBackend;
pub use formloop_utils::error::LlmError;
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, Role};

use formloop_config::Config;
use openai_backend::OpenAiBackend;

/// Providers accepted in `llm.provider`.
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "openai-compatible"];

/// Create the configured backend, wrapped in a [`BudgetedBackend`] when
/// `llm.budget` is set.
pub fn from_config(config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let backend: Arc<dyn LlmBackend> = match config.llm_provider() {
        "openai" | "openai-compatible" => Arc::new(OpenAiBackend::new_from_config(config)?),
        unknown => {
            return Err(LlmError::Unsupported(format!(
                "Unknown LLM provider '{unknown}'. Supported providers: {}.",
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }
    };

    tracing::debug!(
        provider = config.llm_provider(),
        model = config.llm_model(),
        budget = ?config.llm.budget,
        "Constructed LLM backend"
    );

    Ok(match config.llm.budget {
        Some(limit) => Arc::new(BudgetedBackend::new(backend, limit)),
        None => backend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let mut config = Config::default();
        config.llm.provider = Some("carrier-pigeon".to_string());
        match from_config(&config) {
            Err(LlmError::Unsupported(msg)) => assert!(msg.contains("carrier-pigeon")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_missing_api_key_is_misconfiguration() {
        let mut config = Config::default();
        config.llm.api_key_env = Some("FORMLOOP_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        match from_config(&config) {
            Err(LlmError::Misconfiguration(msg)) => {
                assert!(msg.contains("FORMLOOP_TEST_KEY_THAT_IS_NEVER_SET"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_budget_wraps_backend() {
        // PATH is always present, so it stands in for an API key here.
        let mut config = Config::default();
        config.llm.api_key_env = Some("PATH".to_string());
        config.llm.budget = Some(3);
        let backend = from_config(&config).unwrap();
        assert_eq!(backend.provider_name(), "openai");
    }
}
