//! Run-scoped key/value state plus the outbound event queue.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use formloop_utils::error::RunError;

use crate::barrier::BarrierCollector;
use crate::event::Event;

/// Well-known context keys.
pub mod keys {
    pub const SESSION_ID: &str = "session_id";
    pub const FIELDS: &str = "fields";
    pub const ANSWERS: &str = "answers";
    pub const ROUND: &str = "round";
    pub const ROUND_TARGETS: &str = "round_targets";
    pub const DRAFT: &str = "draft";
    pub const DOCUMENT_INDEX_HANDLE: &str = "document_index_handle";
    pub const SOURCE_PATH: &str = "source_path";
    pub const FORM_PATH: &str = "form_path";
    pub const LAST_FEEDBACK: &str = "last_feedback";
    pub const ROUND_STARTED_MS: &str = "round_started_ms";
}

/// State owned by one run.
///
/// Values are stored as JSON so the whole store can be snapshotted while the
/// run is suspended. The outbox and barrier buffers are transient and are not
/// part of a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextStore {
    values: BTreeMap<String, serde_json::Value>,
    #[serde(skip)]
    outbox: Vec<Event>,
    #[serde(skip)]
    barrier: BarrierCollector,
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `key`, falling back to `default` when absent or of another type.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(err) => {
                warn!(key = key, error = %err, "Context value has unexpected type");
                default
            }
        }
    }

    pub fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RunError> {
        self.values
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    RunError::Internal(format!("context key '{key}' has unexpected shape: {e}"))
                })
            })
            .transpose()
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), RunError> {
        let value = serde_json::to_value(value).map_err(|e| {
            RunError::Internal(format!("context key '{key}' could not be stored: {e}"))
        })?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Queue an event in addition to a handler's return value.
    pub fn send_event(&mut self, event: Event) {
        self.outbox.push(event);
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    pub fn barrier_mut(&mut self) -> &mut BarrierCollector {
        &mut self.barrier
    }

    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        self.get(keys::FIELDS, Vec::new())
    }

    #[must_use]
    pub fn answers(&self) -> BTreeMap<String, String> {
        self.get(keys::ANSWERS, BTreeMap::new())
    }

    #[must_use]
    pub fn round(&self) -> u32 {
        self.get(keys::ROUND, 0)
    }

    #[must_use]
    pub fn round_targets(&self) -> Vec<String> {
        self.get(keys::ROUND_TARGETS, Vec::new())
    }

    #[must_use]
    pub fn session_id(&self) -> String {
        self.get(keys::SESSION_ID, String::new())
    }

    #[must_use]
    pub fn draft(&self) -> Option<String> {
        self.get(keys::DRAFT, None)
    }
}
