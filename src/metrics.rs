//! Lightweight counters for observing a throttler
//!
//! Every counter is an atomic updated with relaxed ordering, so recording
//! never takes the throttler's lock and never allocates.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by every [`Throttler`](crate::Throttler)
#[derive(Debug, Default)]
pub struct ThrottleMetrics {
    /// Total calls to `request`
    pub requests: AtomicU64,
    /// Requests that started an execution right away
    pub immediate_executions: AtomicU64,
    /// Executions started by the trailing timer
    pub trailing_executions: AtomicU64,
    /// Requests whose arguments replaced those of an already pending call
    pub superseded_requests: AtomicU64,
    /// Executions that finished, whatever the outcome
    pub completed_executions: AtomicU64,
    /// Executions that returned an error
    pub failures: AtomicU64,
    /// Executions that panicked
    pub panics: AtomicU64,
    /// Error observer invocations that panicked
    pub observer_panics: AtomicU64,
}

/// Point-in-time copy of [`ThrottleMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub immediate_executions: u64,
    pub trailing_executions: u64,
    pub superseded_requests: u64,
    pub completed_executions: u64,
    pub failures: u64,
    pub panics: u64,
    pub observer_panics: u64,
}

impl ThrottleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_immediate(&self) {
        self.immediate_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trailing(&self) {
        self.trailing_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_superseded(&self) {
        self.superseded_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_observer_panic(&self) {
        self.observer_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            immediate_executions: self.immediate_executions.load(Ordering::Relaxed),
            trailing_executions: self.trailing_executions.load(Ordering::Relaxed),
            superseded_requests: self.superseded_requests.load(Ordering::Relaxed),
            completed_executions: self.completed_executions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            observer_panics: self.observer_panics.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus text format
    ///
    /// `throttler` is emitted as a label so several throttlers can share one
    /// scrape endpoint.
    pub fn export_prometheus(&self, throttler: &str) -> String {
        let snapshot = self.snapshot();
        let mut output = String::with_capacity(1024);

        let counters = [
            (
                "trailcrab_requests_total",
                "Total number of throttled requests",
                snapshot.requests,
            ),
            (
                "trailcrab_immediate_executions_total",
                "Executions started directly by a request",
                snapshot.immediate_executions,
            ),
            (
                "trailcrab_trailing_executions_total",
                "Executions started by the trailing timer",
                snapshot.trailing_executions,
            ),
            (
                "trailcrab_superseded_requests_total",
                "Requests whose arguments replaced a pending call",
                snapshot.superseded_requests,
            ),
            (
                "trailcrab_completed_executions_total",
                "Executions that finished with any outcome",
                snapshot.completed_executions,
            ),
            (
                "trailcrab_failures_total",
                "Executions that returned an error",
                snapshot.failures,
            ),
            (
                "trailcrab_panics_total",
                "Executions that panicked",
                snapshot.panics,
            ),
            (
                "trailcrab_observer_panics_total",
                "Error observer calls that panicked",
                snapshot.observer_panics,
            ),
        ];

        for (name, help, value) in counters {
            // Writing to a String cannot fail
            let _ = writeln!(output, "# HELP {name} {help}");
            let _ = writeln!(output, "# TYPE {name} counter");
            let _ = writeln!(output, "{name}{{throttler=\"{throttler}\"}} {value}");
        }

        output
    }
}
