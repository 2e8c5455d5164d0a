//! Observability metrics for decorated callables.
//!
//! Provides counters about invocations and caching for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking decorator statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads. A
/// single `Metrics` handle can be shared by several wrappers; clones share the
/// same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Times the wrapped callable actually ran
    invocations: AtomicU64,
    /// Calls answered from a cache without running the callable
    cache_hits: AtomicU64,
    /// Trailing executions scheduled by throttles
    trailing_scheduled: AtomicU64,
    /// Trailing executions replaced before they fired
    trailing_superseded: AtomicU64,
    /// Deferred executions that panicked or could not be scheduled
    deferred_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                invocations: AtomicU64::new(0),
                cache_hits: AtomicU64::new(0),
                trailing_scheduled: AtomicU64::new(0),
                trailing_superseded: AtomicU64::new(0),
                deferred_failures: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_invocation(&self) {
        self.inner.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trailing_scheduled(&self) {
        self.inner
            .trailing_scheduled
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trailing_superseded(&self) {
        self.inner
            .trailing_superseded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred_failure(&self) {
        self.inner.deferred_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of times a wrapped callable ran.
    pub fn invocations(&self) -> u64 {
        self.inner.invocations.load(Ordering::Relaxed)
    }

    /// Get the number of calls answered from a cache.
    pub fn cache_hits(&self) -> u64 {
        self.inner.cache_hits.load(Ordering::Relaxed)
    }

    /// Get the number of trailing executions scheduled.
    pub fn trailing_scheduled(&self) -> u64 {
        self.inner.trailing_scheduled.load(Ordering::Relaxed)
    }

    /// Get the number of trailing executions superseded before firing.
    pub fn trailing_superseded(&self) -> u64 {
        self.inner.trailing_superseded.load(Ordering::Relaxed)
    }

    /// Get the number of failed deferred executions.
    pub fn deferred_failures(&self) -> u64 {
        self.inner.deferred_failures.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations: self.invocations(),
            cache_hits: self.cache_hits(),
            trailing_scheduled: self.trailing_scheduled(),
            trailing_superseded: self.trailing_superseded(),
            deferred_failures: self.deferred_failures(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.invocations.store(0, Ordering::Relaxed);
        self.inner.cache_hits.store(0, Ordering::Relaxed);
        self.inner.trailing_scheduled.store(0, Ordering::Relaxed);
        self.inner.trailing_superseded.store(0, Ordering::Relaxed);
        self.inner.deferred_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Times the wrapped callable actually ran
    pub invocations: u64,
    /// Calls answered from a cache without running the callable
    pub cache_hits: u64,
    /// Trailing executions scheduled by throttles
    pub trailing_scheduled: u64,
    /// Trailing executions replaced before they fired
    pub trailing_superseded: u64,
    /// Deferred executions that panicked or could not be scheduled
    pub deferred_failures: u64,
}

impl MetricsSnapshot {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no calls have been recorded.
    pub fn hit_rate(&self) -> f64 {
        let total = self.invocations.saturating_add(self.cache_hits);
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Get the total number of calls answered (invocations + cache hits).
    pub fn total_calls(&self) -> u64 {
        self.invocations.saturating_add(self.cache_hits)
    }
}
