use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use formloop_utils::error::RunError;

use crate::collaborators::QueryAnswerer;
use crate::dispatcher::PooledStep;
use crate::event::Event;

/// Answers one field's question against the document index.
pub(crate) struct AskQuestionStep {
    answerer: Arc<dyn QueryAnswerer>,
}

impl AskQuestionStep {
    pub fn new(answerer: Arc<dyn QueryAnswerer>) -> Self {
        Self { answerer }
    }
}

#[async_trait]
impl PooledStep for AskQuestionStep {
    fn name(&self) -> &'static str {
        "ask_question"
    }

    async fn run(&self, event: Event) -> Result<Vec<Event>, RunError> {
        let Event::Query {
            round,
            field,
            question,
            index,
        } = event
        else {
            return Err(super::unexpected(self.name(), &event));
        };

        let started = Instant::now();
        let answer = self.answerer.answer_query(&index, &question).await?;
        debug!(
            round = round,
            field = %field,
            duration_ms = started.elapsed().as_millis() as u64,
            "Answered field"
        );

        Ok(vec![Event::Response {
            round,
            field,
            answer,
        }])
    }
}
