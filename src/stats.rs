//! Statistics tracking for the resolver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Atomic counters updated by every query task.
pub struct Stats {
    requests: AtomicU64,
    forwarded: AtomicU64,
    cached: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    /// Cumulative handling time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            cached: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_forwarded(&self, elapsed: Duration) {
        self.record(&self.forwarded, elapsed);
    }

    pub fn record_cached(&self, elapsed: Duration) {
        self.record(&self.cached, elapsed);
    }

    pub fn record_timed_out(&self, elapsed: Duration) {
        self.record(&self.timed_out, elapsed);
    }

    pub fn record_failed(&self, elapsed: Duration) {
        self.record(&self.failed, elapsed);
    }

    fn record(&self, counter: &AtomicU64, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let cached = self.cached.swap(0, Ordering::Relaxed);
        let timed_out = self.timed_out.swap(0, Ordering::Relaxed);
        let failed = self.failed.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let avg_response_ms = if requests > 0 {
            (total_us as f64 / requests as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests,
            forwarded,
            cached,
            timed_out,
            failed,
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub forwarded: u64,
    pub cached: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub avg_response_ms: f64,
}
