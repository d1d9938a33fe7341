//! Statistics tracking for the proxy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic counters shared by the receive loop and every query task.
pub struct Stats {
    pub requests: AtomicU64,
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub recv_errors: AtomicU64,
    /// Cumulative upstream time of forwarded queries, in microseconds.
    total_upstream_time_us: AtomicU64,
    started: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            recv_errors: AtomicU64::new(0),
            total_upstream_time_us: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, upstream_ms: f64) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.total_upstream_time_us
            .fetch_add((upstream_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let failed = self.failed.swap(0, Ordering::Relaxed);
        let recv_errors = self.recv_errors.swap(0, Ordering::Relaxed);
        let total_us = self.total_upstream_time_us.swap(0, Ordering::Relaxed);

        let avg_upstream_ms = if forwarded > 0 {
            (total_us as f64 / forwarded as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            requests,
            forwarded,
            failed,
            recv_errors,
            avg_upstream_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub forwarded: u64,
    pub failed: u64,
    pub recv_errors: u64,
    pub avg_upstream_ms: f64,
}
