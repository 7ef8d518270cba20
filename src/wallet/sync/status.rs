//! Pass statistics and connectivity health.
//!
//! This module provides the `PassStatsTracker`, which records the outcome of
//! every reconciliation pass. The derived [`SyncHealth`] rides on each
//! published snapshot: a transient backend failure never surfaces as a hard
//! error, only as this connectivity indicator going stale.

use crate::backend::RawSyncStatus;
use crate::wallet::types::SyncHealth;

use chrono::{DateTime, Utc};

/// Tracker for reconciliation pass outcomes.
#[derive(Debug, Default)]
pub struct PassStatsTracker {
    passes_completed: u64,
    passes_failed: u64,
    ticks_coalesced: u64,
    last_pass_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    backend: RawSyncStatus,
}

impl PassStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed pass and the backend progress it observed.
    pub fn record_success(&mut self, at: DateTime<Utc>, backend: RawSyncStatus) {
        self.passes_completed += 1;
        self.last_pass_at = Some(at);
        self.last_error = None;
        self.backend = backend;
    }

    /// Record a recovered pass failure; the last-good snapshot stays up.
    pub fn record_failure(&mut self, error: &str) {
        self.passes_failed += 1;
        self.last_error = Some(error.to_string());
    }

    /// Record ticks that coalesced into an already-running pass.
    pub fn add_coalesced(&mut self, ticks: u64) {
        self.ticks_coalesced += ticks;
    }

    /// Current health indicator for snapshot publication.
    pub fn health(&self) -> SyncHealth {
        SyncHealth {
            passes_completed: self.passes_completed,
            passes_failed: self.passes_failed,
            last_pass_at: self.last_pass_at,
            last_error: self.last_error.clone(),
            backend_in_progress: self.backend.in_progress,
            backend_synced_blocks: self.backend.synced_blocks,
            backend_total_blocks: self.backend.total_blocks,
        }
    }

    /// Get a human-readable summary of the pass statistics.
    pub fn summary(&self) -> String {
        format!(
            "{} passes completed, {} failed, {} ticks coalesced{}",
            self.passes_completed,
            self.passes_failed,
            self.ticks_coalesced,
            match &self.last_error {
                Some(error) => format!(" (last error: {})", error),
                None => String::new(),
            }
        )
    }
}
