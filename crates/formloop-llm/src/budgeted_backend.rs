//! Call-count limiter wrapping any `LlmBackend`.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use formloop_utils::error::LlmError;

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

/// Enforces an upper bound on invocations for the lifetime of the wrapper.
///
/// Attempts are counted, not successes: a failed call still consumes its
/// slot, so retry loops above this layer cannot exceed the limit.
pub struct BudgetedBackend {
    inner: Arc<dyn LlmBackend>,
    calls: AtomicU32,
    limit: u32,
}

impl BudgetedBackend {
    pub fn new(inner: Arc<dyn LlmBackend>, limit: u32) -> Self {
        debug!(limit = limit, provider = inner.provider_name(), "Creating BudgetedBackend");
        Self {
            inner,
            calls: AtomicU32::new(0),
            limit,
        }
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let current = self.calls.fetch_add(1, Ordering::SeqCst);

        if current >= self.limit {
            let attempted = current + 1;
            warn!(limit = self.limit, attempted = attempted, "Budget limit exceeded");
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }

        debug!(
            call_count = current + 1,
            limit = self.limit,
            purpose = %inv.purpose,
            "Budget check passed"
        );

        self.inner.invoke(inv).await
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}
