//! Dispatch table and the queue-draining loop that drives a run.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, trace};

use formloop_utils::error::RunError;

use crate::context::ContextStore;
use crate::event::{Event, EventKind};

/// A handler with exclusive access to the run's context.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut ContextStore, event: Event) -> Result<Vec<Event>, RunError>;
}

/// A context-free handler executed on the bounded worker pool.
#[async_trait]
pub trait PooledStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, event: Event) -> Result<Vec<Event>, RunError>;
}

#[derive(Clone)]
pub enum Handler {
    Sequential(Arc<dyn Step>),
    Pooled(Arc<dyn PooledStep>),
}

impl Handler {
    fn name(&self) -> &'static str {
        match self {
            Self::Sequential(step) => step.name(),
            Self::Pooled(step) => step.name(),
        }
    }
}

/// `EventKind -> Handler`. Each kind routes to exactly one handler.
#[derive(Default, Clone)]
pub struct StepRegistry {
    handlers: HashMap<EventKind, Handler>,
}

impl StepRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, handler: Handler) -> Result<(), RunError> {
        if let Some(existing) = self.handlers.get(&kind) {
            return Err(RunError::Internal(format!(
                "event kind '{kind}' is already handled by '{}', cannot register '{}'",
                existing.name(),
                handler.name()
            )));
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn register_sequential(
        &mut self,
        kind: EventKind,
        step: Arc<dyn Step>,
    ) -> Result<(), RunError> {
        self.register(kind, Handler::Sequential(step))
    }

    pub fn register_pooled(
        &mut self,
        kind: EventKind,
        step: Arc<dyn PooledStep>,
    ) -> Result<(), RunError> {
        self.register(kind, Handler::Pooled(step))
    }

    #[must_use]
    pub fn get(&self, kind: EventKind) -> Option<&Handler> {
        self.handlers.get(&kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Where a drain stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Suspended { draft: String, prompt: String },
    Completed { draft: String },
    Failed(RunError),
}

pub struct Dispatcher {
    registry: StepRegistry,
    workers: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: StepRegistry, workers: usize) -> Self {
        Self {
            registry,
            workers: workers.max(1),
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process `initial` and everything it produces until the run suspends,
    /// completes, or a handler fails.
    ///
    /// Sequential handlers run one at a time against `ctx`; pooled handlers
    /// run concurrently, at most `workers` at once, and their outputs are fed
    /// back into the queue. Every dispatched event is copied to `events_tx`
    /// while someone holds the receiving end.
    /// Dropping the returned future aborts all in-flight pooled tasks.
    pub async fn drain(
        &self,
        ctx: &mut ContextStore,
        initial: Vec<Event>,
        events_tx: Option<&mpsc::UnboundedSender<Event>>,
    ) -> DrainOutcome {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut queue: VecDeque<Event> = initial.into();
        let mut tasks: JoinSet<Result<Vec<Event>, RunError>> = JoinSet::new();

        loop {
            if let Some(event) = queue.pop_front() {
                if let Some(tx) = events_tx
                    && !tx.is_closed()
                {
                    let _ = tx.send(event.clone());
                }

                let kind = event.kind();
                match event {
                    Event::InputRequired { draft, prompt } => {
                        debug!(in_flight = tasks.len(), "Run suspended awaiting input");
                        return DrainOutcome::Suspended { draft, prompt };
                    }
                    Event::Stop { draft } => {
                        debug!("Run reached terminal event");
                        return DrainOutcome::Completed { draft };
                    }
                    event => {
                        let Some(handler) = self.registry.get(kind) else {
                            return DrainOutcome::Failed(RunError::Internal(format!(
                                "no handler registered for event kind '{kind}'"
                            )));
                        };
                        trace!(event = %kind, step = handler.name(), "Dispatching event");

                        match handler {
                            Handler::Sequential(step) => match step.run(ctx, event).await {
                                Ok(outputs) => {
                                    queue.extend(outputs);
                                    queue.extend(ctx.take_outbox());
                                }
                                Err(err) => return DrainOutcome::Failed(err),
                            },
                            Handler::Pooled(step) => {
                                let step = Arc::clone(step);
                                let permits = Arc::clone(&permits);
                                tasks.spawn(async move {
                                    let _permit = permits.acquire_owned().await.map_err(|e| {
                                        RunError::Internal(format!("worker pool closed: {e}"))
                                    })?;
                                    step.run(event).await
                                });
                            }
                        }
                    }
                }
                continue;
            }

            match tasks.join_next().await {
                Some(Ok(Ok(outputs))) => queue.extend(outputs),
                Some(Ok(Err(err))) => return DrainOutcome::Failed(err),
                Some(Err(join_err)) => {
                    return DrainOutcome::Failed(RunError::Internal(format!(
                        "pooled step did not complete: {join_err}"
                    )));
                }
                None => {
                    return DrainOutcome::Failed(RunError::Internal(
                        "run stalled: no pending events and no suspension".to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fanout;

    #[async_trait]
    impl Step for Fanout {
        fn name(&self) -> &'static str {
            "fanout"
        }

        async fn run(&self, _ctx: &mut ContextStore, _event: Event) -> Result<Vec<Event>, RunError> {
            Ok((0..8)
                .map(|i| Event::Feedback {
                    text: format!("q{i}"),
                })
                .collect())
        }
    }

    struct Echo {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PooledStep for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn run(&self, event: Event) -> Result<Vec<Event>, RunError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            let Event::Feedback { text } = event else {
                return Err(RunError::Internal("unexpected event".into()));
            };
            Ok(vec![Event::Response {
                round: 1,
                field: text,
                answer: "ok".into(),
            }])
        }
    }

    struct Gather;

    #[async_trait]
    impl Step for Gather {
        fn name(&self) -> &'static str {
            "gather"
        }

        async fn run(&self, ctx: &mut ContextStore, event: Event) -> Result<Vec<Event>, RunError> {
            match ctx.barrier_mut().collect(1, 8, event) {
                Some(batch) => Ok(vec![Event::InputRequired {
                    draft: format!("{} answers", batch.len()),
                    prompt: "Feedback?".into(),
                }]),
                None => Ok(vec![]),
            }
        }
    }

    struct Failing;

    #[async_trait]
    impl Step for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _ctx: &mut ContextStore, _event: Event) -> Result<Vec<Event>, RunError> {
            Err(RunError::collaborator("stub", "boom"))
        }
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = StepRegistry::new();
        registry
            .register_sequential(EventKind::Start, Arc::new(Fanout))
            .unwrap();
        let err = registry
            .register_sequential(EventKind::Start, Arc::new(Failing))
            .unwrap_err();
        assert!(matches!(err, RunError::Internal(msg) if msg.contains("fanout")));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_fanout_respects_worker_bound_and_suspends() {
        let echo = Arc::new(Echo {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut registry = StepRegistry::new();
        registry
            .register_sequential(EventKind::Start, Arc::new(Fanout))
            .unwrap();
        registry
            .register_pooled(EventKind::Feedback, echo.clone())
            .unwrap();
        registry
            .register_sequential(EventKind::Response, Arc::new(Gather))
            .unwrap();

        let dispatcher = Dispatcher::new(registry, 3);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ctx = ContextStore::new();
        let outcome = dispatcher
            .drain(
                &mut ctx,
                vec![Event::Start {
                    source_path: "s".into(),
                    form_path: "f".into(),
                }],
                Some(&tx),
            )
            .await;

        assert_eq!(
            outcome,
            DrainOutcome::Suspended {
                draft: "8 answers".into(),
                prompt: "Feedback?".into()
            }
        );
        assert!(echo.peak.load(Ordering::SeqCst) <= 3);

        let mut seen = 0;
        while rx.try_recv().is_ok() {
            seen += 1;
        }
        // start, 8 fan-out events, 8 responses, input_required
        assert_eq!(seen, 18);
    }

    #[tokio::test]
    async fn test_missing_handler_is_internal() {
        let dispatcher = Dispatcher::new(StepRegistry::new(), 1);
        let outcome = dispatcher
            .drain(&mut ContextStore::new(), vec![Event::GenerateQuestions], None)
            .await;
        assert!(matches!(outcome, DrainOutcome::Failed(RunError::Internal(_))));
    }

    #[tokio::test]
    async fn test_handler_failure_aborts_run() {
        let mut registry = StepRegistry::new();
        registry
            .register_sequential(EventKind::GenerateQuestions, Arc::new(Failing))
            .unwrap();
        let dispatcher = Dispatcher::new(registry, 1);
        let outcome = dispatcher
            .drain(&mut ContextStore::new(), vec![Event::GenerateQuestions], None)
            .await;
        assert!(matches!(
            outcome,
            DrainOutcome::Failed(RunError::Collaborator { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_queue_without_suspension_stalls() {
        struct Sink;

        #[async_trait]
        impl Step for Sink {
            fn name(&self) -> &'static str {
                "sink"
            }

            async fn run(&self, _: &mut ContextStore, _: Event) -> Result<Vec<Event>, RunError> {
                Ok(vec![])
            }
        }

        let mut registry = StepRegistry::new();
        registry
            .register_sequential(EventKind::GenerateQuestions, Arc::new(Sink))
            .unwrap();
        let dispatcher = Dispatcher::new(registry, 1);
        let outcome = dispatcher
            .drain(&mut ContextStore::new(), vec![Event::GenerateQuestions], None)
            .await;
        assert!(matches!(outcome, DrainOutcome::Failed(RunError::Internal(msg)) if msg.contains("stalled")));
    }

    #[tokio::test]
    async fn test_stop_completes_without_handler() {
        let dispatcher = Dispatcher::new(StepRegistry::new(), 1);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let outcome = dispatcher
            .drain(
                &mut ContextStore::new(),
                vec![Event::Stop {
                    draft: "done".into(),
                }],
                Some(&tx),
            )
            .await;
        assert_eq!(
            outcome,
            DrainOutcome::Completed {
                draft: "done".into()
            }
        );
    }
}
