//! Core types for LLM backend abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use formloop_utils::error::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Input to an LLM backend invocation
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// What the call is for ("extract_fields", "answer_query", ...), used in logs
    pub purpose: String,
    /// Model to use; empty selects the backend default
    pub model: String,
    pub timeout: Duration,
    pub messages: Vec<Message>,
    /// Provider-specific overrides (`max_tokens`, `temperature`)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(
        purpose: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            purpose: purpose.into(),
            model: model.into(),
            timeout,
            messages,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Result from an LLM backend invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    /// Raw response text from the LLM
    pub raw_response: String,
    pub provider: String,
    /// Model that was actually used
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }
}

/// Trait implemented by every LLM provider.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;

    /// Provider name for logs
    fn provider_name(&self) -> &str;
}
