//! Observability hook for cache events.
//!
//! Caches never talk to a metrics registry directly. They receive an
//! [`EventCounter`] at construction time and report named events through
//! it; the server wires in a Prometheus-backed implementation, tests use
//! [`RecordingCounter`] or [`NoopCounter`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Fire-and-forget event counter.
///
/// Implementations must be cheap and must not block: the caches call
/// `increment` on their hot paths, sometimes while holding a read lock.
pub trait EventCounter: Send + Sync {
    /// Record one occurrence of `event`.
    fn increment(&self, event: &'static str);
}

/// Shared counter handle as stored by the caches.
pub type SharedCounter = Arc<dyn EventCounter>;

/// Counter that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCounter;

impl NoopCounter {
    /// Returns the no-op counter as a shared handle.
    pub fn shared() -> SharedCounter {
        Arc::new(Self)
    }
}

impl EventCounter for NoopCounter {
    fn increment(&self, _event: &'static str) {}
}

/// Counter that keeps an in-memory tally per event name.
#[derive(Debug, Default)]
pub struct RecordingCounter {
    counts: Mutex<HashMap<&'static str, u64>>,
}

impl RecordingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `event` was recorded.
    pub fn count(&self, event: &str) -> u64 {
        self.counts.lock().get(event).copied().unwrap_or(0)
    }

    /// Sum over all events.
    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// Copy of the current tallies.
    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        self.counts.lock().clone()
    }
}

impl EventCounter for RecordingCounter {
    fn increment(&self, event: &'static str) {
        *self.counts.lock().entry(event).or_insert(0) += 1;
    }
}

impl<C: EventCounter + ?Sized> EventCounter for Arc<C> {
    fn increment(&self, event: &'static str) {
        (**self).increment(event);
    }
}
