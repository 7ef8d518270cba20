//! State persistence service for wallet synchronization.
//!
//! This module provides the `StatePersistenceService`, which manages saving
//! and restoring the pending-transaction set and the last-known fingerprint.
//! It uses repository traits to abstract the details of file-based
//! persistence so that a send in flight is not forgotten if the process
//! restarts before confirmation, and the first fast tick after a restart
//! does not spuriously escalate when nothing changed.
//!
//! Persistence is best-effort: the engine is authoritative in memory, so
//! save failures are logged and otherwise ignored by callers.

use crate::wallet::sync::repositories::{
    FileFingerprintRepository, FilePendingStateRepository, FingerprintRepository,
    PendingStateRepository,
};
use crate::wallet::types::{ChangeFingerprint, PendingTransaction, WalletSyncError};

use std::path::PathBuf;
use tracing::warn;

/// Service for managing state persistence operations.
pub struct StatePersistenceService {
    pending_repo: Box<dyn PendingStateRepository + Send + Sync>,
    fingerprint_repo: Box<dyn FingerprintRepository + Send + Sync>,
    wallet_id: String,
}

impl StatePersistenceService {
    /// Create a new state persistence service for the given data directory.
    pub fn new(data_dir: PathBuf, wallet_id: String) -> Self {
        Self {
            pending_repo: Box::new(FilePendingStateRepository::new(data_dir.clone())),
            fingerprint_repo: Box::new(FileFingerprintRepository::new(data_dir)),
            wallet_id,
        }
    }

    /// Persist the current pending set and fingerprint after a pass.
    ///
    /// Failures are demoted to warnings; disk is best-effort.
    pub async fn save(
        &self,
        entries: &[PendingTransaction],
        fingerprint: &ChangeFingerprint,
    ) {
        if let Err(e) = self.pending_repo.save(&self.wallet_id, entries).await {
            warn!("Failed to persist pending set: {}", e);
        }
        if let Err(e) = self
            .fingerprint_repo
            .save(&self.wallet_id, fingerprint)
            .await
        {
            warn!("Failed to persist fingerprint: {}", e);
        }
    }

    /// Restore persisted state on session start, if any exists.
    pub async fn restore(
        &self,
    ) -> Result<(Vec<PendingTransaction>, Option<ChangeFingerprint>), WalletSyncError> {
        let entries = self
            .pending_repo
            .load(&self.wallet_id)
            .await?
            .unwrap_or_default();
        let fingerprint = self.fingerprint_repo.load(&self.wallet_id).await?;
        Ok((entries, fingerprint))
    }
}
