//! OpenAI-compatible chat-completions backend
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol
//! (OpenAI, Azure-style proxies, local servers such as vLLM or Ollama).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use formloop_config::Config;
use formloop_utils::error::LlmError;

use crate::http_client::HttpClient;
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message};

const PROVIDER: &str = "openai";

#[derive(Clone)]
pub(crate) struct OpenAiBackend {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl OpenAiBackend {
    pub fn new(
        api_key: String,
        base_url: &str,
        default_model: String,
        default_params: HttpParams,
        max_retries: u32,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::new(max_retries)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            default_model,
            default_params,
        })
    }

    /// Build from the `[llm]` section; the API key comes from the environment
    /// variable named by `llm.api_key_env`.
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let api_key_env = config.llm_api_key_env();
        let api_key = std::env::var(api_key_env).map_err(|_| {
            LlmError::Misconfiguration(format!(
                "API key not found in environment variable '{api_key_env}'. \
                 Set it or configure a different api_key_env in [llm]."
            ))
        })?;

        Self::new(
            api_key,
            config.llm_base_url(),
            config.llm_model().to_string(),
            HttpParams {
                max_tokens: config.llm_max_tokens(),
                temperature: config.llm_temperature(),
            },
            config.llm_max_retries(),
        )
    }

    /// `inv.model` and `inv.metadata` override the backend defaults.
    fn resolve_params(&self, inv: &LlmInvocation) -> (String, HttpParams) {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(self.default_params.max_tokens);

        let temperature = inv
            .metadata
            .get("temperature")
            .and_then(serde_json::Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(self.default_params.temperature);

        (
            model,
            HttpParams {
                max_tokens,
                temperature,
            },
        )
    }

    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|msg| ChatMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let (model, params) = self.resolve_params(&inv);

        debug!(
            provider = PROVIDER,
            purpose = %inv.purpose,
            model = %model,
            max_tokens = params.max_tokens,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking chat completion"
        );

        let request_body = ChatRequest {
            model: model.clone(),
            messages: Self::convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        let request = self
            .client
            .client()
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, PROVIDER)
            .await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("Failed to parse chat response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                LlmError::Transport("Chat response missing choices[0].message.content".to_string())
            })?;

        let mut result = LlmResult::new(content, PROVIDER, model);
        if let Some(usage) = body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider = PROVIDER,
            purpose = %inv.purpose,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Chat completion finished"
        );

        Ok(result)
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
