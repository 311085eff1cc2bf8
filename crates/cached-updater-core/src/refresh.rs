//! Periodically refreshed single-value cache.
//!
//! [`RefreshingCache`] keeps the last document produced by a slow or flaky
//! [`Producer`] and serves it to readers while it is trusted. A background
//! task started with [`RefreshingCache::start`] refreshes the document on a
//! fixed interval.
//!
//! ## Activation
//!
//! The cache is either *active* (the snapshot may be served) or *inactive*
//! (every read goes straight to the producer). A refresh that succeeds
//! activates the cache; a refresh that reports an error or panics
//! deactivates it. Inactive reads never write back, so only the refresh task
//! can bring the cache back.
//!
//! ## Locking
//!
//! The snapshot and the activation flag live behind one `RwLock`. The
//! producer is always called with no lock held; the write lock is taken only
//! to swap the finished snapshot in.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::counter::SharedCounter;
use crate::events;
use crate::producer::{Producer, Snapshot};

/// Result of a single refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The producer succeeded; the cache is active.
    Fresh,
    /// The producer reported an error; its output was stored and the cache
    /// is inactive.
    Failed,
    /// The producer panicked; the previous snapshot is kept and the cache is
    /// inactive.
    Panicked,
}

struct CacheState<T> {
    snapshot: Snapshot<T>,
    active: bool,
}

/// Single-document cache refreshed in the background.
pub struct RefreshingCache<P: Producer> {
    update_interval: Duration,
    producer: P,
    counter: SharedCounter,
    state: RwLock<CacheState<P::Output>>,
}

impl<P: Producer> RefreshingCache<P> {
    /// Creates an inactive cache around `producer`.
    ///
    /// # Panics
    ///
    /// Panics if `update_interval` is zero.
    pub fn new(update_interval: Duration, producer: P, counter: SharedCounter) -> Self {
        assert!(
            !update_interval.is_zero(),
            "update interval must be greater than zero"
        );

        Self {
            update_interval,
            producer,
            counter,
            state: RwLock::new(CacheState {
                snapshot: Snapshot::empty(),
                active: false,
            }),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Whether the current snapshot is being served.
    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    /// The stored snapshot, regardless of activation.
    ///
    /// This is what the last completed refresh left behind, including any
    /// error the producer reported with it.
    pub fn snapshot(&self) -> Snapshot<P::Output> {
        self.state.read().snapshot.clone()
    }

    /// Returns the cached document, or asks the producer directly.
    ///
    /// While the cache is active and holds a value, the stored pair is
    /// returned as-is. Otherwise the producer is called and its answer is
    /// returned without being cached.
    pub async fn get(&self) -> Snapshot<P::Output> {
        {
            let state = self.state.read();
            if state.active && state.snapshot.has_value() {
                self.counter.increment(events::GET_CACHED_RESPONSE);
                debug!("Serving cached response");
                return state.snapshot.clone();
            }
        }

        self.counter.increment(events::GET_UNCACHED_RESPONSE);
        debug!("Cache inactive, serving uncached response");
        self.producer.produce().await
    }

    /// Calls the producer once and installs the result.
    ///
    /// Never panics, even if the producer does.
    pub async fn refresh(&self) -> RefreshOutcome {
        let produced = AssertUnwindSafe(self.producer.produce())
            .catch_unwind()
            .await;

        match produced {
            Ok(snapshot) => {
                let error = snapshot.error().cloned();
                {
                    let mut state = self.state.write();
                    state.snapshot = snapshot;
                    state.active = error.is_none();
                }

                match error {
                    None => {
                        self.counter.increment(events::REFRESH_SUCCESS);
                        debug!("Response cache refreshed");
                        RefreshOutcome::Fresh
                    }
                    Some(err) => {
                        self.counter.increment(events::REFRESH_ERROR);
                        warn!(error = %err, "Response cache refresh failed, cache deactivated");
                        RefreshOutcome::Failed
                    }
                }
            }
            Err(panic) => {
                self.state.write().active = false;
                self.counter.increment(events::REFRESH_PANIC);
                warn!(
                    panic = %panic_message(panic.as_ref()),
                    "Recovered from response cache panic, cache deactivated"
                );
                RefreshOutcome::Panicked
            }
        }
    }
}

impl<P: Producer + 'static> RefreshingCache<P> {
    /// Spawns the refresh loop.
    ///
    /// The loop refreshes immediately, then once per update interval until
    /// `token` is cancelled. A refresh that is already running when the
    /// token fires is allowed to finish. Call this once per cache.
    pub fn start(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            cache.refresh().await;
            info!(
                update_interval = ?cache.update_interval,
                "Response cache updater started"
            );

            let period = cache.update_interval;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        info!("Response cache updater stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        cache.refresh().await;
                    }
                }
            }
        })
    }
}

impl<P: Producer> std::fmt::Debug for RefreshingCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshingCache")
            .field("update_interval", &self.update_interval)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
