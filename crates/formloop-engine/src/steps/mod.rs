//! Built-in steps of the form-filling workflow.
//!
//! `Start -> setup -> ParseForm -> parse_form -> GenerateQuestions ->
//! generate_questions -> Query* -> ask_question -> Response* -> fill_in ->
//! InputRequired`, then `HumanResponse -> decide -> Stop | Feedback`, where
//! `Feedback` re-enters `generate_questions`.

mod ask_question;
mod decide;
mod fill_in;
mod generate_questions;
mod parse_form;
mod setup;

use std::sync::Arc;

use formloop_utils::error::RunError;

use crate::cache::IndexCache;
use crate::collaborators::Collaborators;
use crate::dispatcher::StepRegistry;
use crate::event::{Event, EventKind};

pub use decide::Verdict;
pub use generate_questions::question_for;
pub use parse_form::normalize_fields;

/// Settings the steps read at dispatch time.
#[derive(Debug, Clone)]
pub(crate) struct StepSettings {
    pub routing_threshold: u8,
    pub acceptance_bypass: bool,
    pub prompt: String,
}

/// Register every workflow step. Fails if a kind ends up with two handlers.
pub(crate) fn register_all(
    registry: &mut StepRegistry,
    collaborators: &Collaborators,
    cache: Arc<IndexCache>,
    settings: &StepSettings,
) -> Result<(), RunError> {
    registry.register_sequential(
        EventKind::Start,
        Arc::new(setup::SetupStep::new(cache, Arc::clone(&collaborators.indexer))),
    )?;
    registry.register_sequential(
        EventKind::ParseForm,
        Arc::new(parse_form::ParseFormStep::new(Arc::clone(
            &collaborators.extractor,
        ))),
    )?;

    let generate = Arc::new(generate_questions::GenerateQuestionsStep::new(
        settings.routing_threshold,
    ));
    registry.register_sequential(EventKind::GenerateQuestions, generate.clone())?;
    registry.register_sequential(EventKind::Feedback, generate)?;

    registry.register_pooled(
        EventKind::Query,
        Arc::new(ask_question::AskQuestionStep::new(Arc::clone(
            &collaborators.answerer,
        ))),
    )?;
    registry.register_sequential(
        EventKind::Response,
        Arc::new(fill_in::FillInStep::new(settings.prompt.clone())),
    )?;
    registry.register_sequential(
        EventKind::HumanResponse,
        Arc::new(decide::DecideStep::new(
            Arc::clone(&collaborators.oracle),
            settings.acceptance_bypass,
        )),
    )?;
    Ok(())
}

/// A step received an event kind it is not registered for.
fn unexpected(step: &str, event: &Event) -> RunError {
    RunError::Internal(format!(
        "step '{step}' cannot handle event kind '{}'",
        event.kind()
    ))
}
