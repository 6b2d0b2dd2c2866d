use async_trait::async_trait;
use std::sync::Arc;

use formloop_llm::{LlmBackend, Message};
use formloop_utils::error::RunError;

use super::{LlmSettings, complete};
use crate::collaborators::DecisionOracle;

const SYSTEM_PROMPT: &str = "You review human feedback on a filled-in application form. \
     Reply with exactly one word: ACCEPT or REVISE.";

fn decision_prompt(draft: &str, feedback: &str) -> String {
    format!(
        "You have received human feedback on the application form you filled out for a candidate.\n\
         Compare the feedback to the contents of the form and decide whether any changes are needed.\n\n\
         <form>\n{draft}\n</form>\n\n\
         <feedback>\n{feedback}\n</feedback>\n\n\
         Reply only with the word:\n\
         - 'ACCEPT' if no change is needed\n\
         - 'REVISE' if the form must be updated based on this feedback"
    )
}

/// Lets the model judge whether feedback requires another round.
pub struct LlmDecisionOracle {
    backend: Arc<dyn LlmBackend>,
    settings: LlmSettings,
}

impl LlmDecisionOracle {
    pub fn new(backend: Arc<dyn LlmBackend>, settings: LlmSettings) -> Self {
        Self { backend, settings }
    }
}

#[async_trait]
impl DecisionOracle for LlmDecisionOracle {
    async fn decide(&self, draft: &str, feedback: &str) -> Result<String, RunError> {
        let reply = complete(
            self.backend.as_ref(),
            &self.settings,
            "decide",
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(decision_prompt(draft, feedback)),
            ],
        )
        .await?;
        Ok(reply.trim().trim_matches(|c: char| c == '\'' || c == '"' || c == '.').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::ScriptedBackend;
    use formloop_llm::LlmError;
    use std::time::Duration;

    fn settings() -> LlmSettings {
        LlmSettings {
            model: "judge".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_reply_is_unquoted() {
        let backend = Arc::new(ScriptedBackend::reply(" 'ACCEPT'.\n"));
        let oracle = LlmDecisionOracle::new(backend.clone(), settings());
        assert_eq!(oracle.decide("A: b", "looks right").await.unwrap(), "ACCEPT");

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].model, "judge");
        assert!(seen[0].messages[1].content.contains("<feedback>\nlooks right\n</feedback>"));
    }

    #[tokio::test]
    async fn test_backend_failure_is_collaborator_error() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(LlmError::Transport(
            "connection reset".into(),
        ))]));
        let oracle = LlmDecisionOracle::new(backend, settings());
        match oracle.decide("", "").await {
            Err(RunError::Collaborator {
                collaborator,
                message,
            }) => {
                assert_eq!(collaborator, "decide");
                assert!(message.contains("connection reset"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
