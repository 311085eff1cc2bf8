//! # cached-updater-core
//!
//! Caching engine placed in front of slow or unreliable upstreams.
//!
//! This crate provides:
//! - [`RefreshingCache`] - a single document refreshed on a timer, with panic
//!   isolation and an active/inactive gate that falls back to the producer
//! - [`DualKeyCache`] - per-entry TTL records looked up by identifier or email
//! - [`Producer`] and [`EventCounter`] - the contracts the caches consume
//!
//! Neither cache persists anything, bounds its size, or shares state across
//! processes.

pub mod counter;
pub mod dual_key;
pub mod error;
pub mod events;
pub mod producer;
pub mod refresh;

pub use counter::{EventCounter, NoopCounter, RecordingCounter, SharedCounter};
pub use dual_key::DualKeyCache;
pub use error::{CacheError, CacheResult, ProducerError};
pub use producer::{FnProducer, Producer, Snapshot};
pub use refresh::{RefreshOutcome, RefreshingCache};

/// Re-exported so callers can build the refresh loop's cancellation token
/// without depending on `tokio-util` themselves.
pub use tokio_util::sync::CancellationToken;
