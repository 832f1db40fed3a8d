//! Shared health state for the /health endpoint.
//! Updated by BatchRefresher after every batch and single-player refresh.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared refresh metrics. Updated by the refresher, read by API.
#[derive(Default)]
pub struct HealthState {
    /// True while a batch refresh is in progress.
    pub batch_running: AtomicBool,
    /// Nanosecond timestamp of the last completed batch (0 = none).
    pub last_batch_at_ns: AtomicU64,
    /// Lifetime count of successful player refreshes.
    pub players_refreshed: AtomicU64,
    /// Lifetime count of failed player refreshes.
    pub players_failed: AtomicU64,
    /// Lifetime count of players skipped for budget.
    pub players_skipped: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_batch_running(&self, v: bool) {
        self.batch_running.store(v, Ordering::Relaxed);
    }

    pub fn set_last_batch_at_ns(&self, ns: u64) {
        self.last_batch_at_ns.store(ns, Ordering::Relaxed);
    }

    pub fn record_player(&self, success: bool) {
        if success {
            self.players_refreshed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.players_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_skipped(&self, n: u64) {
        self.players_skipped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn batch_running(&self) -> bool {
        self.batch_running.load(Ordering::Relaxed)
    }

    pub fn last_batch_at_ns(&self) -> u64 {
        self.last_batch_at_ns.load(Ordering::Relaxed)
    }

    pub fn players_refreshed(&self) -> u64 {
        self.players_refreshed.load(Ordering::Relaxed)
    }

    pub fn players_failed(&self) -> u64 {
        self.players_failed.load(Ordering::Relaxed)
    }

    pub fn players_skipped(&self) -> u64 {
        self.players_skipped.load(Ordering::Relaxed)
    }
}
