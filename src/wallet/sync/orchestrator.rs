//! Reconciliation pass orchestrator and integration point for all sync services.
//!
//! This module defines the `WalletSyncOrchestrator`, which coordinates one full
//! reconciliation pass: it advances the backend rescan, fetches the raw
//! transaction list and balance report, reconciles them into the canonical
//! record list, retires or expires pending broadcasts against that same list,
//! derives the categorized balance, and publishes a new immutable snapshot
//! wholesale. It also owns the send path, which inserts a pending entry and
//! triggers an immediate pass so a self-originated send becomes visible
//! without waiting for the backend to list it.
//!
//! Concurrency model: every piece of mutable engine state lives behind one
//! `tokio::sync::Mutex`. A tick that arrives while a pass holds the lock
//! coalesces into a no-op; the in-flight pass already covers it. Cancellation
//! is cooperative: the token is checked before each expensive step, and a
//! pass whose token fired mid-flight discards its results unpublished.

use crate::backend::SyncClient;
use crate::wallet::sync::balance::BalanceCalculator;
use crate::wallet::sync::events::{EventDispatcher, SyncEvent, SyncEventHandler};
use crate::wallet::sync::fingerprint::FingerprintProbe;
use crate::wallet::sync::pending::{PendingConfig, PendingTransactionTracker};
use crate::wallet::sync::reconciler::TransactionReconciler;
use crate::wallet::sync::state_persistence::StatePersistenceService;
use crate::wallet::sync::status::PassStatsTracker;
use crate::wallet::types::{
    ChangeFingerprint, PendingStatus, PendingTransaction, TransactionRecord, WalletSnapshot,
    WalletSyncError,
};

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What prompted a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTrigger {
    /// Fast cadence: escalate only if the fingerprint moved.
    FastTick,
    /// Slow cadence: unconditional full pass.
    SlowTick,
    /// First pass when the session starts.
    Startup,
    /// Immediately after a successful broadcast.
    PostSend,
}

/// Result of asking for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// A full pass ran and published a snapshot.
    Published { changed: bool },
    /// Fast tick found an unchanged fingerprint; no pass ran.
    Unchanged,
    /// Another pass was already in flight; this tick was a no-op.
    Coalesced,
    /// Cancellation was requested; results (if any) were discarded.
    Cancelled,
    /// The pass failed recoverably; the last-good snapshot stands.
    Failed,
}

/// Mutable engine state, serialized behind a single lock.
struct EngineState {
    pending: PendingTransactionTracker,
    last_fingerprint: Option<ChangeFingerprint>,
    last_snapshot: Arc<WalletSnapshot>,
    stats: PassStatsTracker,
    dispatcher: EventDispatcher,
}

/// Coordinator for wallet state reconciliation.
pub struct WalletSyncOrchestrator {
    client: Arc<dyn SyncClient>,
    probe: FingerprintProbe,
    persistence: Arc<StatePersistenceService>,
    state: Mutex<EngineState>,
    snapshot_tx: watch::Sender<Arc<WalletSnapshot>>,
    cancel: CancellationToken,
    ticks_coalesced: AtomicU64,
}

impl WalletSyncOrchestrator {
    pub fn new(
        client: Arc<dyn SyncClient>,
        persistence: Arc<StatePersistenceService>,
        pending_config: PendingConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(WalletSnapshot::default()));

        Self {
            probe: FingerprintProbe::new(client.clone()),
            client,
            persistence,
            state: Mutex::new(EngineState {
                pending: PendingTransactionTracker::new(pending_config),
                last_fingerprint: None,
                last_snapshot: Arc::new(WalletSnapshot::default()),
                stats: PassStatsTracker::new(),
                dispatcher: EventDispatcher::new(),
            }),
            snapshot_tx,
            cancel,
            ticks_coalesced: AtomicU64::new(0),
        }
    }

    /// Register a notification handler; called for every published pass.
    pub async fn register_handler(&self, handler: Box<dyn SyncEventHandler>) {
        let mut state = self.state.lock().await;
        state.dispatcher.register_handler(handler);
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<WalletSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// The most recently published snapshot.
    pub fn latest_snapshot(&self) -> Arc<WalletSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Restore persisted pending entries and fingerprint on session start.
    pub async fn restore_persisted(&self) {
        match self.persistence.restore().await {
            Ok((entries, fingerprint)) => {
                let mut state = self.state.lock().await;
                if !entries.is_empty() {
                    info!("Restoring {} persisted pending entries", entries.len());
                }
                state.pending.restore(entries, Utc::now());
                state.last_fingerprint = fingerprint;
            }
            Err(e) => warn!("Could not restore persisted sync state: {}", e),
        }
    }

    /// Run (or coalesce) a reconciliation pass for the given trigger.
    ///
    /// Recoverable failures return `Ok(PassOutcome::Failed)` and leave the
    /// last-good snapshot in place; only fatal errors surface as `Err`, at
    /// which point the caller must stop polling.
    pub async fn run_pass(&self, trigger: PassTrigger) -> Result<PassOutcome, WalletSyncError> {
        // Non-reentrant pass guard: if a pass is in flight, this tick is
        // already covered by it.
        let Ok(mut state) = self.state.try_lock() else {
            debug!("Pass already in flight, coalescing {:?} tick", trigger);
            self.ticks_coalesced.fetch_add(1, Ordering::Relaxed);
            return Ok(PassOutcome::Coalesced);
        };

        if self.cancel.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        if trigger == PassTrigger::FastTick {
            let fingerprint = match self.probe.refresh().await {
                Ok(f) => f,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // A missed change here is healed by the slow cadence.
                    debug!("Fingerprint refresh failed, treating as unchanged: {}", e);
                    state.stats.record_failure(&e.to_string());
                    return Ok(PassOutcome::Unchanged);
                }
            };

            if state.last_fingerprint.as_ref() == Some(&fingerprint) {
                return Ok(PassOutcome::Unchanged);
            }
            debug!("Fingerprint changed, escalating to full pass");
        }

        match self.full_pass(&mut state).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => {
                error!("Fatal error during reconciliation pass: {}", e);
                Err(e)
            }
            Err(e) => {
                warn!("Reconciliation pass failed, keeping last-good snapshot: {}", e);
                state.stats.record_failure(&e.to_string());
                state
                    .dispatcher
                    .dispatch(&SyncEvent::PassFailed {
                        error: e.to_string(),
                        recoverable: true,
                    })
                    .await;
                Ok(PassOutcome::Failed)
            }
        }
    }

    /// One full reconciliation pass. Caller holds the state lock.
    async fn full_pass(&self, state: &mut EngineState) -> Result<PassOutcome, WalletSyncError> {
        if self.cancel.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }
        let sync_status = self.client.sync().await?;

        if self.cancel.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }
        let raw_transactions = self.client.get_transactions().await?;
        let raw_balance = self.client.get_balance().await?;

        // Everything below is local and fast; one last cooperative check
        // before results become observable.
        if self.cancel.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        let current_height = sync_status.current_height;
        let canonical = TransactionReconciler::reconcile(&raw_transactions, current_height);

        let now = Utc::now();
        let pending_outcome = state.pending.reconcile(&canonical, now);
        let pending_entries = state.pending.entries();

        let balance = BalanceCalculator::compute(&canonical, &pending_entries, &raw_balance);

        // Display list: canonical records plus a provisional entry for each
        // still-unsighted broadcast.
        let mut transactions = canonical;
        let provisional = state.pending.provisional_records(&transactions);
        transactions.extend(provisional);
        transactions.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.txid.cmp(&b.txid))
                .then_with(|| a.direction.cmp(&b.direction))
        });

        let fingerprint = FingerprintProbe::summarize(&raw_balance, &raw_transactions);

        let previous = state.last_snapshot.clone();
        let new_transactions: Vec<TransactionRecord> = transactions
            .iter()
            .filter(|record| {
                !previous
                    .transactions
                    .iter()
                    .any(|p| p.txid == record.txid && p.direction == record.direction)
            })
            .cloned()
            .collect();

        let changed = state.last_fingerprint.as_ref() != Some(&fingerprint)
            || previous.pending != pending_entries
            || !new_transactions.is_empty();

        state
            .stats
            .add_coalesced(self.ticks_coalesced.swap(0, Ordering::Relaxed));
        state.stats.record_success(now, sync_status);

        let snapshot = Arc::new(WalletSnapshot {
            balance,
            transactions,
            pending: pending_entries.clone(),
            chain_height: current_height,
            synced_at: Some(now),
            health: state.stats.health(),
        });

        // Publish wholesale; readers never see a partial view.
        state.last_fingerprint = Some(fingerprint.clone());
        state.last_snapshot = snapshot.clone();
        self.snapshot_tx.send_replace(snapshot.clone());

        self.persistence.save(&pending_entries, &fingerprint).await;

        for txid in pending_outcome.newly_expired {
            state
                .dispatcher
                .dispatch(&SyncEvent::PendingExpired { txid })
                .await;
        }
        state
            .dispatcher
            .dispatch(&SyncEvent::SnapshotPublished {
                snapshot,
                new_transactions,
                changed,
            })
            .await;

        debug!("Pass complete: {}", state.stats.summary());
        Ok(PassOutcome::Published { changed })
    }

    /// Broadcast a transaction and track it as pending.
    ///
    /// On success the txid is returned and an immediate pass publishes the
    /// provisional view; a rejected broadcast is surfaced synchronously and
    /// never enters the pending set.
    pub async fn send_transaction(
        &self,
        to_address: &str,
        amount: u64,
        memo: Option<String>,
    ) -> Result<String, WalletSyncError> {
        if self.cancel.is_cancelled() {
            return Err(WalletSyncError::SessionClosed);
        }

        let mut entry =
            PendingTransaction::broadcasting(to_address.to_string(), amount, memo.clone(), Utc::now());

        match self.client.send_transaction(to_address, amount, memo).await {
            Ok(txid) => {
                info!("Broadcast accepted: {}", txid);
                entry.mark_broadcast(txid.clone());
                {
                    let mut state = self.state.lock().await;
                    state.pending.insert(entry);

                    // Persist right away so a crash does not forget the send.
                    let pending_entries = state.pending.entries();
                    let fingerprint = state.last_fingerprint.clone().unwrap_or_default();
                    self.persistence.save(&pending_entries, &fingerprint).await;
                }

                if let Err(e) = self.run_pass(PassTrigger::PostSend).await {
                    // The send itself succeeded; a fatal pass error is the
                    // scheduler's problem on its next tick.
                    warn!("Post-send pass failed: {}", e);
                }

                Ok(txid)
            }
            Err(e) => {
                warn!("Broadcast rejected: {}", e);
                entry.status = PendingStatus::Failed;
                Err(WalletSyncError::SendRejected(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{RawBalance, TxDirection};
    use crate::wallet::sync::testing::{MockSyncClient, raw_tx, test_txid};

    fn balance(shielded: u64, spendable: u64, verified: u64, unverified: u64) -> RawBalance {
        RawBalance {
            transparent: 0,
            shielded,
            spendable_shielded: spendable,
            verified_shielded: verified,
            unverified_shielded: unverified,
        }
    }

    fn orchestrator(
        mock: Arc<MockSyncClient>,
        dir: &std::path::Path,
    ) -> Arc<WalletSyncOrchestrator> {
        let persistence = Arc::new(StatePersistenceService::new(
            dir.to_path_buf(),
            "test-wallet".to_string(),
        ));
        Arc::new(WalletSyncOrchestrator::new(
            mock,
            persistence,
            PendingConfig::default(),
            CancellationToken::new(),
        ))
    }

    #[tokio::test]
    async fn test_full_pass_publishes_snapshot() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        *mock.balance.lock().unwrap() = balance(1_000, 1_000, 1_000, 0);
        mock.transactions
            .lock()
            .unwrap()
            .push(raw_tx(1, TxDirection::Received, 1_000));

        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock, dir.path());

        let outcome = engine.run_pass(PassTrigger::Startup).await.expect("pass");
        assert_eq!(outcome, PassOutcome::Published { changed: true });

        let snapshot = engine.latest_snapshot();
        assert_eq!(snapshot.transactions.len(), 1);
        assert_eq!(snapshot.balance.unified_total, 1_000);
        assert_eq!(snapshot.chain_height, 100);
        assert_eq!(snapshot.health.passes_completed, 1);
    }

    #[tokio::test]
    async fn test_unchanged_fast_tick_skips_full_pass() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        mock.transactions
            .lock()
            .unwrap()
            .push(raw_tx(1, TxDirection::Received, 1_000));

        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock.clone(), dir.path());

        engine.run_pass(PassTrigger::Startup).await.expect("pass");
        let syncs_after_startup = mock.sync_calls.load(std::sync::atomic::Ordering::SeqCst);

        for _ in 0..5 {
            let outcome = engine.run_pass(PassTrigger::FastTick).await.expect("tick");
            assert_eq!(outcome, PassOutcome::Unchanged);
        }

        assert_eq!(
            mock.sync_calls.load(std::sync::atomic::Ordering::SeqCst),
            syncs_after_startup
        );
    }

    #[tokio::test]
    async fn test_changed_fast_tick_escalates() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock.clone(), dir.path());

        engine.run_pass(PassTrigger::Startup).await.expect("pass");

        mock.transactions
            .lock()
            .unwrap()
            .push(raw_tx(2, TxDirection::Received, 7_000));

        let outcome = engine.run_pass(PassTrigger::FastTick).await.expect("tick");
        assert_eq!(outcome, PassOutcome::Published { changed: true });
        assert_eq!(engine.latest_snapshot().transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_recoverable_failure_keeps_last_good_snapshot() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        *mock.balance.lock().unwrap() = balance(1_000, 1_000, 1_000, 0);

        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock.clone(), dir.path());
        engine.run_pass(PassTrigger::Startup).await.expect("pass");

        mock.fail_queries.store(true, std::sync::atomic::Ordering::SeqCst);
        let outcome = engine.run_pass(PassTrigger::SlowTick).await.expect("pass");
        assert_eq!(outcome, PassOutcome::Failed);

        // Last-good snapshot still published.
        assert_eq!(engine.latest_snapshot().balance.unified_total, 1_000);
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        mock.report_corrupt.store(true, std::sync::atomic::Ordering::SeqCst);

        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock, dir.path());

        let result = engine.run_pass(PassTrigger::SlowTick).await;
        assert!(matches!(result, Err(ref e) if e.is_fatal()));
    }

    #[tokio::test]
    async fn test_send_is_visible_then_superseded_without_double_count() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        *mock.balance.lock().unwrap() = balance(2_000_000, 1_000_000, 1_000_000, 1_000_000);
        *mock.send_txid.lock().unwrap() = Some(test_txid(9));

        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock.clone(), dir.path());
        engine.run_pass(PassTrigger::Startup).await.expect("pass");

        let txid = engine
            .send_transaction("zs1destination", 500_000, None)
            .await
            .expect("send");
        assert_eq!(txid, test_txid(9));

        // Provisional view: pending debit applied, synthesized record shown,
        // even though the backend has not listed the transaction.
        let snapshot = engine.latest_snapshot();
        assert_eq!(snapshot.balance.unified_total, 1_500_000);
        assert_eq!(snapshot.balance.unverified, 500_000);
        assert_eq!(snapshot.pending.len(), 1);
        assert_eq!(snapshot.transactions.len(), 1);
        assert_eq!(snapshot.transactions[0].txid, test_txid(9));
        assert_eq!(snapshot.transactions[0].confirmations, 0);

        // Backend catches up: the canonical record appears and the balance
        // report now reflects the spend.
        {
            let mut transactions = mock.transactions.lock().unwrap();
            let mut sent = raw_tx(9, TxDirection::Sent, 500_000);
            sent.block_height = Some(101);
            sent.fee = Some(1_000);
            transactions.push(sent);
        }
        *mock.balance.lock().unwrap() = balance(1_499_000, 1_499_000, 1_499_000, 0);
        mock.status.lock().unwrap().current_height = 101;

        let outcome = engine.run_pass(PassTrigger::SlowTick).await.expect("pass");
        assert_eq!(outcome, PassOutcome::Published { changed: true });

        let snapshot = engine.latest_snapshot();
        // Pending entry retired, exactly one record, no double-counted debit.
        assert!(snapshot.pending.is_empty());
        assert_eq!(snapshot.transactions.len(), 1);
        assert_eq!(snapshot.transactions[0].block_height, Some(101));
        assert_eq!(snapshot.balance.unified_total, 1_499_000);
    }

    #[tokio::test]
    async fn test_rejected_send_never_enters_pending_set() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        *mock.send_txid.lock().unwrap() = None;

        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock, dir.path());

        let result = engine.send_transaction("zs1destination", 500_000, None).await;
        assert!(matches!(result, Err(WalletSyncError::SendRejected(_))));
        assert!(engine.latest_snapshot().pending.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_pass_coalesces() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        let gate = Arc::new(tokio::sync::Notify::new());
        *mock.hold_sync.lock().unwrap() = Some(gate.clone());

        let dir = tempfile::tempdir().expect("tempdir");
        let engine = orchestrator(mock.clone(), dir.path());

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_pass(PassTrigger::SlowTick).await })
        };
        // Let the first pass take the lock and park inside sync().
        tokio::task::yield_now().await;

        let outcome = engine.run_pass(PassTrigger::FastTick).await.expect("tick");
        assert_eq!(outcome, PassOutcome::Coalesced);

        *mock.hold_sync.lock().unwrap() = None;
        gate.notify_one();

        let outcome = first.await.expect("join").expect("pass");
        assert_eq!(outcome, PassOutcome::Published { changed: true });
    }

    #[tokio::test]
    async fn test_pending_survives_restart() {
        let mock = Arc::new(MockSyncClient::with_height(100));
        *mock.balance.lock().unwrap() = balance(1_000_000, 1_000_000, 1_000_000, 0);
        *mock.send_txid.lock().unwrap() = Some(test_txid(3));

        let dir = tempfile::tempdir().expect("tempdir");
        {
            let engine = orchestrator(mock.clone(), dir.path());
            engine.run_pass(PassTrigger::Startup).await.expect("pass");
            engine
                .send_transaction("zs1destination", 250_000, None)
                .await
                .expect("send");
        }

        // New session over the same data directory.
        let engine = orchestrator(mock, dir.path());
        engine.restore_persisted().await;
        engine.run_pass(PassTrigger::Startup).await.expect("pass");

        let snapshot = engine.latest_snapshot();
        assert_eq!(snapshot.pending.len(), 1);
        assert_eq!(snapshot.pending[0].txid, test_txid(3));
    }
}
