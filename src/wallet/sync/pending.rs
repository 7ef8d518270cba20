//! Pending transaction lifecycle tracking.
//!
//! This module provides the `PendingTransactionTracker`, which owns every
//! transaction this wallet broadcast until the reconciler sights it in the
//! canonical list or it times out. A still-unsighted broadcast is the source
//! of the synthesized provisional record that makes a self-originated send
//! visible within one fast tick, long before the backend's own transaction
//! list catches up.
//!
//! Per-entry state machine: `broadcasting -> broadcast -> {confirmed | expired}`.
//! Sighting and expiry are exclusive: an entry that is both due to expire and
//! sighted in the same pass is confirmed, never expired. Expired entries are
//! retained for a grace period for "send may have failed" signaling, then
//! purged.

use crate::backend::TxDirection;
use crate::wallet::types::{PendingStatus, PendingTransaction, TransactionRecord};

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Timing knobs for the pending lifecycle.
#[derive(Debug, Clone)]
pub struct PendingConfig {
    /// How long an unsighted broadcast stays active before expiring.
    pub sighting_timeout: Duration,
    /// How long an expired entry is retained for failure signaling.
    pub expired_retention: Duration,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            sighting_timeout: Duration::seconds(60),
            expired_retention: Duration::seconds(300),
        }
    }
}

/// Outcome of reconciling the pending set against one canonical list.
#[derive(Debug, Default)]
pub struct PendingReconcileOutcome {
    /// Txids retired because a canonical record superseded them.
    pub confirmed: Vec<String>,
    /// Txids that hit the sighting timeout this pass.
    pub newly_expired: Vec<String>,
}

/// Tracker owning the pending set between reconciliation passes.
#[derive(Debug)]
pub struct PendingTransactionTracker {
    entries: HashMap<String, PendingTransaction>,
    config: PendingConfig,
}

impl PendingTransactionTracker {
    pub fn new(config: PendingConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Insert a broadcast entry returned by the send path.
    pub fn insert(&mut self, entry: PendingTransaction) {
        info!(
            "Tracking pending transaction {} ({} zatoshis to {})",
            entry.txid, entry.amount, entry.to_address
        );
        self.entries.insert(entry.txid.clone(), entry);
    }

    /// Restore persisted entries on session start. Entries whose timeout
    /// already elapsed while the process was down are demoted to expired
    /// rather than silently dropped.
    pub fn restore(&mut self, persisted: Vec<PendingTransaction>, now: DateTime<Utc>) {
        for mut entry in persisted {
            if !entry.is_active() {
                continue;
            }
            if now - entry.created_at > self.config.sighting_timeout {
                warn!(
                    "Pending transaction {} expired while offline",
                    entry.txid
                );
                entry.status = PendingStatus::Expired;
            }
            self.entries.insert(entry.txid.clone(), entry);
        }
    }

    /// Reconcile the pending set against the canonical list used for the
    /// same published snapshot.
    pub fn reconcile(
        &mut self,
        canonical: &[TransactionRecord],
        now: DateTime<Utc>,
    ) -> PendingReconcileOutcome {
        let sighted: HashSet<&str> = canonical.iter().map(|r| r.txid.as_str()).collect();
        let mut outcome = PendingReconcileOutcome::default();

        for entry in self.entries.values_mut() {
            if !entry.is_active() {
                continue;
            }

            // Sighting wins over expiry; the real record supersedes us.
            if !entry.txid.is_empty() && sighted.contains(entry.txid.as_str()) {
                entry.status = PendingStatus::Confirmed;
                outcome.confirmed.push(entry.txid.clone());
            } else if now - entry.created_at > self.config.sighting_timeout {
                warn!(
                    "Pending transaction {} not sighted within timeout, marking expired",
                    entry.txid
                );
                entry.status = PendingStatus::Expired;
                outcome.newly_expired.push(entry.txid.clone());
            }
        }

        // Confirmed entries are superseded immediately; expired ones linger
        // for the retention window.
        self.entries
            .retain(|_, e| e.status != PendingStatus::Confirmed);
        let retention_cutoff = self.config.sighting_timeout + self.config.expired_retention;
        self.entries.retain(|_, e| {
            e.status != PendingStatus::Expired || now - e.created_at <= retention_cutoff
        });

        outcome
    }

    /// Synthesize provisional records for active broadcasts the canonical
    /// list has not sighted yet.
    pub fn provisional_records(&self, canonical: &[TransactionRecord]) -> Vec<TransactionRecord> {
        let sighted: HashSet<&str> = canonical.iter().map(|r| r.txid.as_str()).collect();

        let mut records: Vec<TransactionRecord> = self
            .entries
            .values()
            .filter(|e| e.is_active() && !e.txid.is_empty() && !sighted.contains(e.txid.as_str()))
            .map(|e| TransactionRecord {
                txid: e.txid.clone(),
                direction: TxDirection::Sent,
                amount: e.amount,
                fee: None,
                from_address: None,
                to_address: Some(e.to_address.clone()),
                block_height: None,
                timestamp: e.created_at.timestamp(),
                memo: e.memo.clone(),
                confirmations: 0,
            })
            .collect();

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.txid.cmp(&b.txid)));
        records
    }

    /// All retained entries, for snapshot publication and persistence.
    pub fn entries(&self) -> Vec<PendingTransaction> {
        let mut entries: Vec<PendingTransaction> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.txid.cmp(&b.txid)));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
