//! Caller-facing handle for one run.
//!
//! A handle moves through `Created -> Running -> Suspended -> Running -> ...
//! -> Terminated`. Work only happens inside [`RunHandle::next_suspension_or_result`]
//! and [`RunHandle::resume`]; between those calls a suspended run holds
//! nothing but its context store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info};

use formloop_utils::error::{RunError, SessionError};
use formloop_utils::logging::{log_run_error, run_span};

use crate::context::ContextStore;
use crate::dispatcher::{Dispatcher, DrainOutcome};
use crate::event::Event;
use crate::merge::format_draft;

/// Replies that accept the draft as-is. Matched after trimming, ignoring case.
pub const ACCEPTANCE_TOKENS: &[&str] = &["done", "ok", "okay", "looks good", "final", "good to go"];

/// Format version of [`RunSnapshot`].
pub const SNAPSHOT_VERSION: u32 = 2;

#[must_use]
pub fn is_acceptance(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    ACCEPTANCE_TOKENS.contains(&text.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Suspended,
    Terminated,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Suspended => "suspended",
            Self::Terminated => "terminated",
        })
    }
}

/// What the caller observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Suspended { draft: String, prompt: String },
    Completed { draft: String },
    Failed { error: RunError },
}

impl RunOutcome {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Suspended { .. })
    }
}

/// Serializable state of a suspended run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub version: u32,
    pub session_id: String,
    pub context: ContextStore,
    pub round: u32,
    pub draft: String,
    pub prompt: String,
    /// When the run first started executing. The run timeout is measured
    /// from here, across suspensions and process restarts.
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

/// Receiving side of a run's event stream. Ends when the run terminates or
/// the handle is dropped. Events are only produced after the stream is taken.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Next already-emitted event, without waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

pub struct RunHandle {
    session_id: String,
    state: RunState,
    ctx: ContextStore,
    dispatcher: Arc<Dispatcher>,
    pending: Vec<Event>,
    suspension: Option<(String, String)>,
    terminal: Option<RunOutcome>,
    run_timeout: Duration,
    started_at: Option<DateTime<Utc>>,
    events_tx: Option<mpsc::UnboundedSender<Event>>,
    stream_taken: bool,
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("round", &self.ctx.round())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl RunHandle {
    pub(crate) fn new(
        session_id: String,
        ctx: ContextStore,
        dispatcher: Arc<Dispatcher>,
        initial: Event,
        run_timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            state: RunState::Created,
            ctx,
            dispatcher,
            pending: vec![initial],
            suspension: None,
            terminal: None,
            run_timeout,
            started_at: None,
            events_tx: None,
            stream_taken: false,
        }
    }

    /// Rebuild a suspended handle from a snapshot.
    pub(crate) fn from_snapshot(
        snapshot: RunSnapshot,
        dispatcher: Arc<Dispatcher>,
        run_timeout: Duration,
    ) -> Self {
        Self {
            session_id: snapshot.session_id,
            state: RunState::Suspended,
            ctx: snapshot.context,
            dispatcher,
            pending: Vec::new(),
            suspension: Some((snapshot.draft, snapshot.prompt)),
            terminal: None,
            run_timeout,
            started_at: Some(snapshot.started_at),
            events_tx: None,
            stream_taken: false,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub fn round(&self) -> u32 {
        self.ctx.round()
    }

    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        self.ctx.fields()
    }

    #[must_use]
    pub fn answers(&self) -> BTreeMap<String, String> {
        self.ctx.answers()
    }

    /// Wall-clock time since the run started executing, suspensions included.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .and_then(|started| (Utc::now() - started).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// The lazy stream of dispatched events. Available once per handle; a
    /// stream taken from a terminated handle ends immediately.
    pub fn take_event_stream(&mut self) -> Option<EventStream> {
        if self.stream_taken {
            return None;
        }
        self.stream_taken = true;
        let (tx, rx) = mpsc::unbounded_channel();
        if self.state != RunState::Terminated {
            self.events_tx = Some(tx);
        }
        Some(EventStream { rx })
    }

    /// Drive the run to its next suspension or to termination.
    ///
    /// Calling this again on a suspended or terminated handle returns the
    /// same observation without doing any work.
    pub async fn next_suspension_or_result(&mut self) -> RunOutcome {
        match self.state {
            RunState::Created | RunState::Running => {
                let events = std::mem::take(&mut self.pending);
                self.drive(events).await
            }
            RunState::Suspended => self.current_suspension(),
            RunState::Terminated => self.terminal_outcome(),
        }
    }

    /// Answer the outstanding suspension.
    ///
    /// Blank text re-exposes the current suspension unchanged. An acceptance
    /// token is fed as an acceptance signal; anything else as feedback.
    pub async fn resume(&mut self, text: &str) -> Result<RunOutcome, RunError> {
        if self.state != RunState::Suspended {
            return Err(RunError::InvalidResume {
                state: self.state.to_string(),
            });
        }

        if self.elapsed() >= self.run_timeout {
            self.ctx.barrier_mut().reset();
            return Ok(self.time_out());
        }

        if text.trim().is_empty() {
            debug!(session = %self.session_id, "Blank response, re-exposing suspension");
            return Ok(self.current_suspension());
        }

        let accepted = is_acceptance(text);
        let event = Event::HumanResponse {
            text: text.trim().to_string(),
            accepted,
        };
        self.suspension = None;
        Ok(self.drive(vec![event]).await)
    }

    /// Capture a suspended run so it can be rehydrated later.
    pub fn snapshot(&self) -> Result<RunSnapshot, SessionError> {
        let Some((draft, prompt)) = &self.suspension else {
            return Err(SessionError::NotSuspended {
                id: self.session_id.clone(),
            });
        };
        let Some(started_at) = self.started_at else {
            return Err(SessionError::NotSuspended {
                id: self.session_id.clone(),
            });
        };
        Ok(RunSnapshot {
            version: SNAPSHOT_VERSION,
            session_id: self.session_id.clone(),
            context: self.ctx.clone(),
            round: self.ctx.round(),
            draft: draft.clone(),
            prompt: prompt.clone(),
            started_at,
            saved_at: Utc::now(),
        })
    }

    async fn drive(&mut self, events: Vec<Event>) -> RunOutcome {
        if self.state == RunState::Terminated {
            return self.terminal_outcome();
        }
        self.state = RunState::Running;
        self.started_at.get_or_insert_with(Utc::now);

        let remaining = self.run_timeout.saturating_sub(self.elapsed());
        let span = run_span(&self.session_id);
        let result = if remaining.is_zero() {
            None
        } else {
            tokio::time::timeout(
                remaining,
                self.dispatcher
                    .drain(&mut self.ctx, events, self.events_tx.as_ref()),
            )
            .instrument(span)
            .await
            .ok()
        };

        match result {
            Some(DrainOutcome::Suspended { draft, prompt }) => {
                self.state = RunState::Suspended;
                self.suspension = Some((draft, prompt));
                self.current_suspension()
            }
            Some(DrainOutcome::Completed { draft }) => {
                info!(
                    session = %self.session_id,
                    rounds = self.ctx.round(),
                    elapsed_ms = self.elapsed().as_millis() as u64,
                    "Run completed"
                );
                self.terminate(RunOutcome::Completed { draft })
            }
            Some(DrainOutcome::Failed(error)) => {
                self.ctx.barrier_mut().reset();
                log_run_error(&self.session_id, error.kind().as_str(), &error.to_string());
                self.terminate(RunOutcome::Failed { error })
            }
            None => {
                // In-flight tasks were aborted when the drain future dropped.
                self.ctx.barrier_mut().reset();
                self.time_out()
            }
        }
    }

    fn time_out(&mut self) -> RunOutcome {
        let error = RunError::Timeout {
            limit: self.run_timeout,
        };
        log_run_error(&self.session_id, error.kind().as_str(), &error.to_string());
        self.terminate(RunOutcome::Failed { error })
    }

    fn terminate(&mut self, outcome: RunOutcome) -> RunOutcome {
        self.state = RunState::Terminated;
        self.suspension = None;
        self.pending.clear();
        // Closing the sender ends the event stream.
        self.events_tx = None;
        self.terminal = Some(outcome.clone());
        outcome
    }

    /// The suspension as seen now: the stored prompt and the draft rendered
    /// from the merged answer store.
    fn current_suspension(&self) -> RunOutcome {
        let (stored_draft, prompt) = self.suspension.clone().unwrap_or_default();
        let fields = self.ctx.fields();
        let draft = if fields.is_empty() {
            stored_draft
        } else {
            format_draft(&fields, &self.ctx.answers())
        };
        RunOutcome::Suspended { draft, prompt }
    }

    fn terminal_outcome(&self) -> RunOutcome {
        self.terminal.clone().unwrap_or_else(|| RunOutcome::Failed {
            error: RunError::Internal("run terminated without an outcome".to_string()),
        })
    }
}
