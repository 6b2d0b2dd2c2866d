use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use formloop_utils::error::RunError;

use crate::collaborators::DecisionOracle;
use crate::context::ContextStore;
use crate::dispatcher::Step;
use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Revise,
}

impl Verdict {
    /// Trimmed, exact comparison. Anything other than `ACCEPT` revises.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token.trim() {
            "ACCEPT" => Self::Accept,
            "REVISE" => Self::Revise,
            other => {
                warn!(token = %other, "Unrecognized decision token, treating as REVISE");
                Self::Revise
            }
        }
    }
}

/// Turns the caller's reply into either the terminal event or a feedback round.
pub(crate) struct DecideStep {
    oracle: Arc<dyn DecisionOracle>,
    acceptance_bypass: bool,
}

impl DecideStep {
    pub fn new(oracle: Arc<dyn DecisionOracle>, acceptance_bypass: bool) -> Self {
        Self {
            oracle,
            acceptance_bypass,
        }
    }
}

#[async_trait]
impl Step for DecideStep {
    fn name(&self) -> &'static str {
        "decide"
    }

    async fn run(&self, ctx: &mut ContextStore, event: Event) -> Result<Vec<Event>, RunError> {
        let Event::HumanResponse { text, accepted } = event else {
            return Err(super::unexpected(self.name(), &event));
        };
        let draft = ctx.draft().unwrap_or_default();

        let verdict = if accepted && self.acceptance_bypass {
            Verdict::Accept
        } else {
            Verdict::parse(&self.oracle.decide(&draft, &text).await?)
        };

        info!(
            session = %ctx.session_id(),
            round = ctx.round(),
            verdict = ?verdict,
            "Decided on human response"
        );

        match verdict {
            Verdict::Accept => Ok(vec![Event::Stop { draft }]),
            Verdict::Revise => Ok(vec![Event::Feedback { text }]),
        }
    }
}
