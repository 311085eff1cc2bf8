//! Prometheus metrics for the cache server.
//!
//! Cache events reach Prometheus through [`PrometheusEventCounter`], which
//! implements the [`EventCounter`] contract the caches are built against. Each
//! counter family carries one `status` label holding the event name.

use std::sync::{Arc, OnceLock};

use cached_updater_core::{EventCounter, SharedCounter, events};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    /// Events of the user cache and the identity provider calls behind it.
    pub const KEYCLOAK_CACHE_EVENTS_TOTAL: &str = "keycloak_cache_events_total";
    /// Events of the refreshing report cache.
    pub const RESPONSE_CACHE_EVENTS_TOTAL: &str = "response_cache_events_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            describe_counters();

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

fn describe_counters() {
    describe_counter!(
        names::KEYCLOAK_CACHE_EVENTS_TOTAL,
        "User cache hits and misses and identity provider calls, by status"
    );
    describe_counter!(
        names::RESPONSE_CACHE_EVENTS_TOTAL,
        "Report cache refreshes and reads, by status"
    );
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// [`EventCounter`] that increments `metric{status="<event>"}`.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusEventCounter {
    metric: &'static str,
}

impl PrometheusEventCounter {
    /// Creates a counter for `metric` and registers every event in `known`
    /// at zero, so the series exist before the first increment.
    pub fn new(metric: &'static str, known: &[&'static str]) -> Self {
        for event in known {
            counter!(metric, "status" => *event).absolute(0);
        }
        Self { metric }
    }

    /// Counter for the user cache.
    pub fn keycloak() -> SharedCounter {
        Arc::new(Self::new(
            names::KEYCLOAK_CACHE_EVENTS_TOTAL,
            events::USER_CACHE_EVENTS,
        ))
    }

    /// Counter for the report cache.
    pub fn response() -> SharedCounter {
        Arc::new(Self::new(
            names::RESPONSE_CACHE_EVENTS_TOTAL,
            events::RESPONSE_CACHE_EVENTS,
        ))
    }

    pub fn metric(&self) -> &'static str {
        self.metric
    }
}

impl EventCounter for PrometheusEventCounter {
    fn increment(&self, event: &'static str) {
        counter!(self.metric, "status" => event).increment(1);
    }
}
