use crate::backend::{BackendError, TxDirection};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A canonical, deduplicated wallet transaction entry.
///
/// Identity is `(txid, direction)`: a self-send legitimately appears as both
/// a debit and a credit leg, and the reconciler decides whether the pair
/// collapses. `confirmations` is derived from `block_height` and the chain
/// tip on every pass, never stored as a fixed number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionRecord {
	pub txid: String,
	pub direction: TxDirection,
	/// Amount moved by this leg, in zatoshis.
	pub amount: u64,
	pub fee: Option<u64>,
	pub from_address: Option<String>,
	pub to_address: Option<String>,
	/// Mined height; `None` while in the mempool (or not yet sighted at all).
	pub block_height: Option<u64>,
	pub timestamp: i64,
	/// Fully assembled memo; `None` while fragments are still missing.
	pub memo: Option<String>,
	pub confirmations: u64,
}

/// Lifecycle of a transaction this wallet broadcast itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
	/// The send call is in flight; no txid yet.
	Broadcasting,
	/// The backend accepted the broadcast and returned a txid.
	Broadcast,
	/// A matching canonical transaction was observed; entry is retired.
	Confirmed,
	/// No sighting within the timeout; surfaced as a failure candidate.
	Expired,
	/// The broadcast itself was rejected; surfaced to the send caller.
	Failed,
}

/// A wallet-originated transaction not yet confirmed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingTransaction {
	pub txid: String,
	pub created_at: DateTime<Utc>,
	pub amount: u64,
	pub to_address: String,
	pub memo: Option<String>,
	pub status: PendingStatus,
}

impl PendingTransaction {
	/// New entry at send time, before the backend has returned a txid.
	pub fn broadcasting(to_address: String, amount: u64, memo: Option<String>, now: DateTime<Utc>) -> Self {
		Self {
			txid: String::new(),
			created_at: now,
			amount,
			to_address,
			memo,
			status: PendingStatus::Broadcasting,
		}
	}

	pub fn mark_broadcast(&mut self, txid: String) {
		self.txid = txid;
		self.status = PendingStatus::Broadcast;
	}

	/// Still awaiting a sighting in the canonical list.
	pub fn is_active(&self) -> bool {
		matches!(self.status, PendingStatus::Broadcasting | PendingStatus::Broadcast)
	}
}

/// Cheap summary of wallet state used to gate full reconciliation.
///
/// Compared by equality against the previous value; never mutated in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeFingerprint {
	pub last_txid: Option<String>,
	pub total_balance: u64,
	pub tx_count: usize,
}

/// Categorized balance view derived on every reconciliation pass.
///
/// All fields are integer zatoshis. Invariants maintained by the calculator:
/// `unified_total = transparent + shielded_spendable + shielded_pending`
/// and `spendable <= verified <= unified_total`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceSnapshot {
	pub transparent: u64,
	pub shielded_spendable: u64,
	pub shielded_pending: u64,
	pub unified_total: u64,
	pub verified: u64,
	pub unverified: u64,
}

impl BalanceSnapshot {
	/// Funds usable for a new send right now.
	pub fn spendable(&self) -> u64 {
		self.transparent.saturating_add(self.shielded_spendable)
	}
}

/// Connectivity and pass-health indicator carried on every snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncHealth {
	pub passes_completed: u64,
	pub passes_failed: u64,
	pub last_pass_at: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
	/// Backend rescan progress as of the last successful pass.
	pub backend_in_progress: bool,
	pub backend_synced_blocks: u64,
	pub backend_total_blocks: u64,
}

/// The externally observable wallet state.
///
/// Always fully formed; replaced wholesale on publish so readers never see a
/// partially reconciled view. `transactions` includes one synthesized
/// unconfirmed entry per still-unsighted pending broadcast.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WalletSnapshot {
	pub balance: BalanceSnapshot,
	pub transactions: Vec<TransactionRecord>,
	pub pending: Vec<PendingTransaction>,
	pub chain_height: u64,
	pub synced_at: Option<DateTime<Utc>>,
	pub health: SyncHealth,
}

/// Error types for the wallet sync engine
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Backend error: {0}")]
	Backend(#[from] BackendError),

	#[error("Invalid address: {0}")]
	InvalidAddress(String),

	#[error("Invalid amount: {0}")]
	InvalidAmount(String),

	#[error("Send rejected: {0}")]
	SendRejected(String),

	#[error("Persistence error: {0}")]
	Persistence(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Session closed")]
	SessionClosed,

	#[error("Fatal: {0}")]
	Fatal(String),
}

impl WalletSyncError {
	/// Fatal errors halt the scheduler; everything else is recovered on the
	/// next tick.
	pub fn is_fatal(&self) -> bool {
		match self {
			WalletSyncError::Fatal(_) => true,
			WalletSyncError::Backend(e) => e.is_fatal(),
			_ => false,
		}
	}
}
