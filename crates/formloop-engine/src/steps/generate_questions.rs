use async_trait::async_trait;
use chrono::Utc;

use formloop_utils::error::RunError;
use formloop_utils::logging::log_round_start;

use crate::collaborators::IndexHandle;
use crate::context::{ContextStore, keys};
use crate::dispatcher::Step;
use crate::event::Event;
use crate::router::route;

/// Starts a query round: every field on the first round, the routed subset
/// after feedback.
pub(crate) struct GenerateQuestionsStep {
    routing_threshold: u8,
}

impl GenerateQuestionsStep {
    pub fn new(routing_threshold: u8) -> Self {
        Self { routing_threshold }
    }
}

/// Question put to the answerer for one field.
#[must_use]
pub fn question_for(field: &str, feedback: Option<&str>) -> String {
    let mut question =
        format!("How would you answer this question about the candidate? <field>{field}</field>");
    if let Some(feedback) = feedback {
        question.push_str(&format!("\nFeedback: <feedback>{feedback}</feedback>"));
    }
    question
}

#[async_trait]
impl Step for GenerateQuestionsStep {
    fn name(&self) -> &'static str {
        "generate_questions"
    }

    async fn run(&self, ctx: &mut ContextStore, event: Event) -> Result<Vec<Event>, RunError> {
        let fields = ctx.fields();
        let (targets, feedback) = match event {
            Event::GenerateQuestions => (fields, None),
            Event::Feedback { text } => (route(&fields, &text, self.routing_threshold), Some(text)),
            other => return Err(super::unexpected(self.name(), &other)),
        };
        if targets.is_empty() {
            return Err(RunError::Internal(
                "question round started without any fields".to_string(),
            ));
        }

        let index: IndexHandle = ctx
            .try_get(keys::DOCUMENT_INDEX_HANDLE)?
            .ok_or_else(|| RunError::Internal("document index handle is not set".to_string()))?;

        let round = ctx.round() + 1;
        ctx.set(keys::ROUND, &round)?;
        ctx.set(keys::ROUND_TARGETS, &targets)?;
        ctx.set(keys::ROUND_STARTED_MS, &Utc::now().timestamp_millis())?;
        if let Some(text) = &feedback {
            ctx.set(keys::LAST_FEEDBACK, text)?;
        }

        log_round_start(&ctx.session_id(), round, &targets);

        Ok(targets
            .into_iter()
            .map(|field| Event::Query {
                round,
                question: question_for(&field, feedback.as_deref()),
                field,
                index: index.clone(),
            })
            .collect())
    }
}
