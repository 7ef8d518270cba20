//! Types for the chain-scanning backend's query surface

use serde::{Deserialize, Serialize};

/// Direction of a raw transaction entry relative to this wallet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    /// Funds left the wallet.
    Sent,
    /// Funds arrived at the wallet.
    Received,
}

/// Categorized balance report from the backend, in zatoshis.
///
/// The backend reports shielded funds three ways: the full pool, the subset
/// that is spendable right now, and the subset whose notes have enough
/// confirmations to be considered verified. All fields are integer minor
/// units; the engine never converts these to floating point.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawBalance {
    /// Transparent pool balance.
    #[serde(rename = "tbalance")]
    pub transparent: u64,
    /// Total shielded pool balance, confirmed or not.
    #[serde(rename = "zbalance")]
    pub shielded: u64,
    /// Shielded funds usable as inputs right now.
    #[serde(rename = "spendable_zbalance")]
    pub spendable_shielded: u64,
    /// Shielded funds above the confirmation threshold.
    #[serde(rename = "verified_zbalance")]
    pub verified_shielded: u64,
    /// Shielded funds still below the confirmation threshold,
    /// including decrypted mempool notes.
    #[serde(rename = "unverified_zbalance")]
    pub unverified_shielded: u64,
}

/// One memo fragment as delivered by the backend.
///
/// A memo too long for a single on-chain field arrives as several fragments
/// tagged with their position; reassembly is the engine's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMemoFragment {
    /// Zero-based position of this fragment within the logical memo.
    pub index: u32,
    /// Fragment payload, already decrypted by the backend.
    pub payload: String,
}

/// A raw transaction entry from the backend's transaction list.
///
/// The list may contain duplicate entries for the same `(txid, direction)`
/// pair, entries with partial memo fragment sets, and entries that are
/// malformed; the reconciler is responsible for merging and filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawTransaction {
    /// Transaction id as a hex string.
    pub txid: String,
    /// Whether this entry debits or credits the wallet.
    pub direction: TxDirection,
    /// Amount moved by this leg, in zatoshis (always a magnitude).
    pub amount: u64,
    /// Network fee paid, known only for wallet-originated entries.
    #[serde(default)]
    pub fee: Option<u64>,
    /// Source address when the backend could attribute one.
    #[serde(default)]
    pub from_address: Option<String>,
    /// Destination address when the backend could attribute one.
    #[serde(default)]
    pub to_address: Option<String>,
    /// Mined height; absent while the transaction sits in the mempool.
    #[serde(default)]
    pub block_height: Option<u64>,
    /// Unix timestamp (seconds) of the block, or of first sighting.
    pub timestamp: i64,
    /// Encrypted-memo fragments attached to this entry, possibly incomplete.
    #[serde(default)]
    pub memo_fragments: Vec<RawMemoFragment>,
}

/// Progress report for the backend's chain rescan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSyncStatus {
    /// Whether a rescan is currently running.
    pub in_progress: bool,
    /// Blocks scanned so far in the current rescan.
    pub synced_blocks: u64,
    /// Total blocks the current rescan covers.
    pub total_blocks: u64,
    /// The backend's latest known chain height.
    pub current_height: u64,
}

/// Server identity returned by the backend's info endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub version: String,
    pub vendor: String,
    pub chain_name: String,
    pub block_height: u64,
}

/// Successful response from the send endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    pub txid: String,
}

/// RPC error code the backend uses to report an unrecoverable wallet state.
pub const RPC_WALLET_CORRUPT: i64 = -32010;

/// Error types for backend client operations
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No data returned")]
    NoData,

    #[error("Wallet corruption reported by backend: {0}")]
    WalletCorrupt(String),
}

impl BackendError {
    /// Transient failures are retried on the next scheduled tick and never
    /// invalidate the last-good snapshot.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Http(_))
    }

    /// Fatal failures halt polling; the session must be re-initialized.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::WalletCorrupt(_))
    }
}
