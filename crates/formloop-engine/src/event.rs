//! The closed set of messages exchanged between steps.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::collaborators::IndexHandle;

/// A typed, immutable message. Each event is consumed exactly once by the
/// handler registered for its [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Event {
    /// Injected by `Engine::start`.
    Start {
        source_path: String,
        form_path: String,
    },
    /// The source document is indexed; extract the form's fields next.
    ParseForm { form_path: String },
    /// Fields are known; query all of them.
    GenerateQuestions,
    /// One field's question, answered by a pooled sub-task.
    Query {
        round: u32,
        field: String,
        question: String,
        index: IndexHandle,
    },
    Response {
        round: u32,
        field: String,
        answer: String,
    },
    /// Suspends the run until the caller resumes it.
    InputRequired { draft: String, prompt: String },
    /// The caller's reply to `InputRequired`.
    HumanResponse { text: String, accepted: bool },
    /// Revision request; re-enters question generation with narrowed scope.
    Feedback { text: String },
    /// Terminal event carrying the accepted draft.
    Stop { draft: String },
}

/// Fieldless tag of [`Event`], the key of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    ParseForm,
    GenerateQuestions,
    Query,
    Response,
    InputRequired,
    HumanResponse,
    Feedback,
    Stop,
}

impl EventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ParseForm => "parse_form",
            Self::GenerateQuestions => "generate_questions",
            Self::Query => "query",
            Self::Response => "response",
            Self::InputRequired => "input_required",
            Self::HumanResponse => "human_response",
            Self::Feedback => "feedback",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start { .. } => EventKind::Start,
            Self::ParseForm { .. } => EventKind::ParseForm,
            Self::GenerateQuestions => EventKind::GenerateQuestions,
            Self::Query { .. } => EventKind::Query,
            Self::Response { .. } => EventKind::Response,
            Self::InputRequired { .. } => EventKind::InputRequired,
            Self::HumanResponse { .. } => EventKind::HumanResponse,
            Self::Feedback { .. } => EventKind::Feedback,
            Self::Stop { .. } => EventKind::Stop,
        }
    }

    /// Events that stop draining and wait for the caller.
    #[must_use]
    pub fn is_suspension(&self) -> bool {
        matches!(self, Self::InputRequired { .. })
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop { .. })
    }

    /// Round tag for round-scoped events.
    #[must_use]
    pub fn round(&self) -> Option<u32> {
        match self {
            Self::Query { round, .. } | Self::Response { round, .. } => Some(*round),
            _ => None,
        }
    }
}
