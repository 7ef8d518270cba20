//! Cheap change detection for the fast polling cadence.
//!
//! The fast tick must decide every second whether anything changed without
//! paying for a full reconciliation pass. The `FingerprintProbe` summarizes
//! the backend's balance and transaction list into a small value type; the
//! fast tick escalates to a full pass only when the summary differs from the
//! last-known one. A transiently stale summary is acceptable for one tick:
//! the slow cadence forces convergence regardless.

use crate::backend::{RawBalance, RawTransaction, SyncClient};
use crate::wallet::types::{ChangeFingerprint, WalletSyncError};

use std::sync::Arc;
use tracing::debug;

/// Probe producing fingerprint values from backend queries.
pub struct FingerprintProbe {
    client: Arc<dyn SyncClient>,
}

impl FingerprintProbe {
    pub fn new(client: Arc<dyn SyncClient>) -> Self {
        Self { client }
    }

    /// Query the backend and summarize into a fresh fingerprint value.
    ///
    /// The saving relative to a full pass is everything downstream of the
    /// queries: no rescan trigger, no merge, no balance math, no publish.
    pub async fn refresh(&self) -> Result<ChangeFingerprint, WalletSyncError> {
        let balance = self.client.get_balance().await?;
        let transactions = self.client.get_transactions().await?;

        let fingerprint = Self::summarize(&balance, &transactions);
        debug!(
            "Fingerprint: {} transactions, balance {}",
            fingerprint.tx_count, fingerprint.total_balance
        );
        Ok(fingerprint)
    }

    /// Summarize raw query results into a fingerprint value.
    pub fn summarize(balance: &RawBalance, transactions: &[RawTransaction]) -> ChangeFingerprint {
        let last_txid = transactions
            .iter()
            .max_by_key(|t| (t.timestamp, t.txid.clone()))
            .map(|t| t.txid.clone());

        ChangeFingerprint {
            last_txid,
            total_balance: balance.transparent.saturating_add(balance.shielded),
            tx_count: transactions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TxDirection;

    fn raw(txid: &str, timestamp: i64) -> RawTransaction {
        RawTransaction {
            txid: txid.to_string(),
            direction: TxDirection::Received,
            amount: 100,
            fee: None,
            from_address: None,
            to_address: None,
            block_height: None,
            timestamp,
            memo_fragments: Vec::new(),
        }
    }

    #[test]
    fn test_identical_state_yields_equal_fingerprints() {
        let balance = RawBalance {
            transparent: 100,
            shielded: 900,
            ..RawBalance::default()
        };
        let transactions = vec![raw("aa", 10), raw("bb", 20)];

        let first = FingerprintProbe::summarize(&balance, &transactions);
        let second = FingerprintProbe::summarize(&balance, &transactions);
        assert_eq!(first, second);
    }

    #[test]
    fn test_new_transaction_changes_fingerprint() {
        let balance = RawBalance::default();
        let before = FingerprintProbe::summarize(&balance, &[raw("aa", 10)]);
        let after = FingerprintProbe::summarize(&balance, &[raw("aa", 10), raw("bb", 20)]);
        assert_ne!(before, after);
        assert_eq!(after.last_txid, Some("bb".to_string()));
    }

    #[test]
    fn test_balance_change_alone_changes_fingerprint() {
        let transactions = vec![raw("aa", 10)];
        let before = FingerprintProbe::summarize(
            &RawBalance {
                shielded: 500,
                ..RawBalance::default()
            },
            &transactions,
        );
        let after = FingerprintProbe::summarize(
            &RawBalance {
                shielded: 600,
                ..RawBalance::default()
            },
            &transactions,
        );
        assert_ne!(before, after);
    }

    #[test]
    fn test_empty_wallet_fingerprint() {
        let fingerprint = FingerprintProbe::summarize(&RawBalance::default(), &[]);
        assert_eq!(fingerprint.last_txid, None);
        assert_eq!(fingerprint.tx_count, 0);
    }
}
