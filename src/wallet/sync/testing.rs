//! Scripted backend mock shared by the engine tests.

use crate::backend::{
    BackendError, RawBalance, RawSyncStatus, RawTransaction, SyncClient, TxDirection,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Deterministic 64-hex txid for test fixtures.
pub fn test_txid(n: u64) -> String {
    format!("{:064x}", n)
}

/// Raw entry builder for test fixtures.
pub fn raw_tx(n: u64, direction: TxDirection, amount: u64) -> RawTransaction {
    RawTransaction {
        txid: test_txid(n),
        direction,
        amount,
        fee: None,
        from_address: None,
        to_address: None,
        block_height: None,
        timestamp: 1_700_000_000 + n as i64,
        memo_fragments: Vec::new(),
    }
}

/// Scripted in-memory SyncClient.
///
/// Tests mutate the interior state between passes; call counters expose how
/// often each query ran. `hold_sync` lets a test park a pass inside `sync()`
/// to exercise coalescing.
#[derive(Default)]
pub struct MockSyncClient {
    pub balance: Mutex<RawBalance>,
    pub transactions: Mutex<Vec<RawTransaction>>,
    pub status: Mutex<RawSyncStatus>,
    pub send_txid: Mutex<Option<String>>,

    pub fail_queries: AtomicBool,
    pub report_corrupt: AtomicBool,

    pub sync_calls: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub send_calls: AtomicUsize,

    pub hold_sync: Mutex<Option<std::sync::Arc<Notify>>>,
}

impl MockSyncClient {
    pub fn with_height(height: u64) -> Self {
        let mock = Self::default();
        mock.status.lock().unwrap().current_height = height;
        mock
    }

    fn injected_failure(&self) -> Option<BackendError> {
        if self.report_corrupt.load(Ordering::SeqCst) {
            return Some(BackendError::WalletCorrupt("wallet.dat unreadable".to_string()));
        }
        if self.fail_queries.load(Ordering::SeqCst) {
            return Some(BackendError::Rpc {
                code: -1,
                message: "connection refused".to_string(),
            });
        }
        None
    }
}

#[async_trait::async_trait]
impl SyncClient for MockSyncClient {
    async fn get_balance(&self) -> Result<RawBalance, BackendError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.injected_failure() {
            return Err(e);
        }
        Ok(self.balance.lock().unwrap().clone())
    }

    async fn get_transactions(&self) -> Result<Vec<RawTransaction>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.injected_failure() {
            return Err(e);
        }
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn sync(&self) -> Result<RawSyncStatus, BackendError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.hold_sync.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(e) = self.injected_failure() {
            return Err(e);
        }
        Ok(self.status.lock().unwrap().clone())
    }

    async fn sync_status(&self) -> Result<RawSyncStatus, BackendError> {
        if let Some(e) = self.injected_failure() {
            return Err(e);
        }
        Ok(self.status.lock().unwrap().clone())
    }

    async fn send_transaction(
        &self,
        _to_address: &str,
        _amount: u64,
        _memo: Option<String>,
    ) -> Result<String, BackendError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        match self.send_txid.lock().unwrap().clone() {
            Some(txid) => Ok(txid),
            None => Err(BackendError::Rpc {
                code: -26,
                message: "transaction rejected by network".to_string(),
            }),
        }
    }
}
