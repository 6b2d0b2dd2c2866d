//! Round-keyed collection of fan-out answers.

use std::collections::BTreeMap;
use tracing::debug;

use crate::event::Event;

/// Buffers `Response` events per round and releases a round's batch once,
/// when exactly the declared number of answers for that round has arrived.
///
/// Answers tagged with a round older than the newest round seen, or with a
/// round that was already released, are dropped.
#[derive(Debug, Clone, Default)]
pub struct BarrierCollector {
    newest_round: u32,
    last_released: Option<u32>,
    pending: BTreeMap<u32, Vec<Event>>,
}

impl BarrierCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `event` to `round`'s buffer. Returns the full batch when the
    /// buffer reaches `expected`, otherwise `None`.
    pub fn collect(&mut self, round: u32, expected: usize, event: Event) -> Option<Vec<Event>> {
        if round < self.newest_round || self.last_released.is_some_and(|r| round <= r) {
            debug!(
                round = round,
                newest_round = self.newest_round,
                event = %event.kind(),
                "Discarding stale answer"
            );
            return None;
        }

        if round > self.newest_round {
            self.newest_round = round;
            // Anything buffered for older rounds can no longer release.
            self.pending.retain(|r, _| *r >= round);
        }

        let buffer = self.pending.entry(round).or_default();
        buffer.push(event);

        if buffer.len() >= expected {
            self.last_released = Some(round);
            return self.pending.remove(&round);
        }
        None
    }

    /// Answers currently buffered for `round`.
    #[must_use]
    pub fn pending_count(&self, round: u32) -> usize {
        self.pending.get(&round).map_or(0, Vec::len)
    }

    /// Drop every buffered answer. Round bookkeeping is kept so late answers
    /// from an aborted round are still recognized as stale.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            debug!(rounds = self.pending.len(), "Releasing buffered barrier state");
        }
        self.pending.clear();
    }
}
