use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

use formloop_utils::error::RunError;
use formloop_utils::logging::log_round_complete;

use crate::context::{ContextStore, keys};
use crate::dispatcher::Step;
use crate::event::Event;
use crate::merge::{format_draft, merge_answers};

/// Waits for the whole round, merges its answers and suspends with the draft.
pub(crate) struct FillInStep {
    prompt: String,
}

impl FillInStep {
    pub fn new(prompt: String) -> Self {
        Self { prompt }
    }
}

#[async_trait]
impl Step for FillInStep {
    fn name(&self) -> &'static str {
        "fill_in"
    }

    async fn run(&self, ctx: &mut ContextStore, event: Event) -> Result<Vec<Event>, RunError> {
        let Some(round) = event.round().filter(|_| matches!(event, Event::Response { .. })) else {
            return Err(super::unexpected(self.name(), &event));
        };

        let current = ctx.round();
        if round != current {
            debug!(round = round, current_round = current, "Ignoring answer from another round");
            return Ok(vec![]);
        }

        let expected = ctx.round_targets().len();
        let Some(batch) = ctx.barrier_mut().collect(round, expected, event) else {
            return Ok(vec![]);
        };

        let updates: BTreeMap<String, String> = batch
            .into_iter()
            .filter_map(|e| match e {
                Event::Response { field, answer, .. } => Some((field, answer)),
                _ => None,
            })
            .collect();

        let answers = merge_answers(&ctx.answers(), &updates);
        let draft = format_draft(&ctx.fields(), &answers);
        ctx.set(keys::ANSWERS, &answers)?;
        ctx.set(keys::DRAFT, &draft)?;

        let started_ms: i64 = ctx.get(keys::ROUND_STARTED_MS, Utc::now().timestamp_millis());
        let duration_ms = u128::try_from(Utc::now().timestamp_millis() - started_ms).unwrap_or(0);
        log_round_complete(&ctx.session_id(), round, updates.len(), duration_ms);

        Ok(vec![Event::InputRequired {
            draft,
            prompt: self.prompt.clone(),
        }])
    }
}
