use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use formloop_llm::{LlmBackend, Message};
use formloop_utils::error::RunError;

use super::{LlmSettings, complete};
use crate::collaborators::FormFieldExtractor;

/// Opening fence with its info string, e.g. "```json\n".
static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```.*?\n").expect("static regex"));

#[derive(Debug, Deserialize)]
struct FieldsResponse {
    fields: Vec<String>,
}

/// Remove markdown code fences around a model reply.
#[must_use]
pub fn strip_code_fences(raw: &str) -> String {
    FENCE_OPEN
        .replace_all(raw, "")
        .trim()
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse `{"fields": [...]}`, tolerating code fences and a bare JSON array.
pub fn parse_fields_response(raw: &str) -> Result<Vec<String>, RunError> {
    let cleaned = strip_code_fences(raw);
    if let Ok(parsed) = serde_json::from_str::<FieldsResponse>(&cleaned) {
        return Ok(parsed.fields);
    }
    serde_json::from_str::<Vec<String>>(&cleaned).map_err(|e| RunError::ExtractionFailure {
        reason: e.to_string(),
        raw: raw.to_string(),
    })
}

fn extraction_prompt(form_text: &str) -> String {
    format!(
        "You are an assistant helping to extract fields from job application forms.\n\
         This is a markdown-formatted list of fields in a job application form:\n\n\
         <form>{form_text}</form>\n\n\
         Respond with a valid JSON object in the following format:\n\
         {{\n  \"fields\": [\"First Name\", \"Last Name\", ...]\n}}\n\n\
         Return only valid JSON, with no markdown, comments or explanations."
    )
}

/// Asks the model for the form's field list.
pub struct LlmFieldExtractor {
    backend: Arc<dyn LlmBackend>,
    settings: LlmSettings,
}

impl LlmFieldExtractor {
    pub fn new(backend: Arc<dyn LlmBackend>, settings: LlmSettings) -> Self {
        Self { backend, settings }
    }
}

#[async_trait]
impl FormFieldExtractor for LlmFieldExtractor {
    async fn extract_fields(&self, form_text: &str) -> Result<Vec<String>, RunError> {
        let raw = complete(
            self.backend.as_ref(),
            &self.settings,
            "extract_fields",
            vec![Message::user(extraction_prompt(form_text))],
        )
        .await?;
        debug!(chars = raw.len(), "Field extraction reply received");
        parse_fields_response(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::ScriptedBackend;
    use std::time::Duration;

    fn settings() -> LlmSettings {
        LlmSettings {
            model: String::new(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_strip_code_fences() {
        let raw = "```json\n{\"fields\": [\"A\"]}\n```";
        assert_eq!(strip_code_fences(raw), "{\"fields\": [\"A\"]}");
        assert_eq!(strip_code_fences("  {\"fields\": []} "), "{\"fields\": []}");
    }

    #[test]
    fn test_parse_fields_response() {
        assert_eq!(
            parse_fields_response("```\n{\"fields\": [\"First Name\", \"Last Name\"]}\n```").unwrap(),
            vec!["First Name".to_string(), "Last Name".to_string()]
        );
        assert_eq!(
            parse_fields_response("[\"Email\"]").unwrap(),
            vec!["Email".to_string()]
        );
    }

    #[test]
    fn test_unparseable_reply_keeps_raw_text() {
        match parse_fields_response("Sure! The fields are: name, email") {
            Err(RunError::ExtractionFailure { raw, .. }) => {
                assert_eq!(raw, "Sure! The fields are: name, email");
            }
            other => panic!("expected ExtractionFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extractor_sends_form_text() {
        let backend = Arc::new(ScriptedBackend::reply("{\"fields\": [\"Phone\"]}"));
        let extractor = LlmFieldExtractor::new(backend.clone(), settings());

        let fields = extractor.extract_fields("| Phone | ____ |").await.unwrap();
        assert_eq!(fields, vec!["Phone".to_string()]);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].purpose, "extract_fields");
        assert!(seen[0].messages[0].content.contains("<form>| Phone | ____ |</form>"));
    }
}
