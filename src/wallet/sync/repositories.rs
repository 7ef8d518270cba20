use crate::wallet::types::{ChangeFingerprint, PendingTransaction, WalletSyncError};

use std::path::PathBuf;
use tracing::info;

/// Repository for the persisted pending-transaction set
#[async_trait::async_trait]
pub trait PendingStateRepository {
	async fn save(
		&self,
		wallet_id: &str,
		entries: &[PendingTransaction],
	) -> Result<(), WalletSyncError>;
	async fn load(
		&self,
		wallet_id: &str,
	) -> Result<Option<Vec<PendingTransaction>>, WalletSyncError>;
}

/// Repository for the persisted last-known fingerprint
#[async_trait::async_trait]
pub trait FingerprintRepository {
	async fn save(
		&self,
		wallet_id: &str,
		fingerprint: &ChangeFingerprint,
	) -> Result<(), WalletSyncError>;
	async fn load(&self, wallet_id: &str) -> Result<Option<ChangeFingerprint>, WalletSyncError>;
}

fn wallet_file_tag(wallet_id: &str) -> String {
	// Wallet ids are caller-chosen; hex keeps the filename safe.
	hex::encode(wallet_id.as_bytes())
}

/// File-based implementation of PendingStateRepository
pub struct FilePendingStateRepository {
	data_dir: PathBuf,
}

impl FilePendingStateRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_pending_filename(&self, wallet_id: &str) -> PathBuf {
		self.data_dir
			.join(format!("pending_{}.json", wallet_file_tag(wallet_id)))
	}

	fn get_metadata_filename(&self, wallet_id: &str) -> PathBuf {
		self.data_dir
			.join(format!("pending_{}.meta.json", wallet_file_tag(wallet_id)))
	}
}

#[async_trait::async_trait]
impl PendingStateRepository for FilePendingStateRepository {
	async fn save(
		&self,
		wallet_id: &str,
		entries: &[PendingTransaction],
	) -> Result<(), WalletSyncError> {
		tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to create data directory: {}", e))
		})?;

		// Create metadata
		let metadata = serde_json::json!({
			"entries": entries.len(),
			"timestamp": chrono::Utc::now().to_rfc3339(),
		});

		let metadata_filename = self.get_metadata_filename(wallet_id);
		tokio::fs::write(
			&metadata_filename,
			serde_json::to_string_pretty(&metadata)
				.map_err(|e| WalletSyncError::Persistence(e.to_string()))?,
		)
		.await
		.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to write pending metadata: {}", e))
		})?;

		let content = serde_json::to_string_pretty(entries)
			.map_err(|e| WalletSyncError::Persistence(format!("Failed to serialize pending set: {}", e)))?;

		let filename = self.get_pending_filename(wallet_id);
		tokio::fs::write(&filename, content).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to write pending file: {}", e))
		})?;

		info!("Saved {} pending entries to {:?}", entries.len(), filename);
		Ok(())
	}

	async fn load(
		&self,
		wallet_id: &str,
	) -> Result<Option<Vec<PendingTransaction>>, WalletSyncError> {
		let filename = self.get_pending_filename(wallet_id);

		if !filename.exists() {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(&filename).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to read pending file: {}", e))
		})?;

		let entries: Vec<PendingTransaction> = serde_json::from_str(&content).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to parse pending file: {}", e))
		})?;

		info!("Loaded {} pending entries from {:?}", entries.len(), filename);
		Ok(Some(entries))
	}
}

/// File-based implementation of FingerprintRepository
pub struct FileFingerprintRepository {
	data_dir: PathBuf,
}

impl FileFingerprintRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_fingerprint_filename(&self, wallet_id: &str) -> PathBuf {
		self.data_dir
			.join(format!("fingerprint_{}.json", wallet_file_tag(wallet_id)))
	}
}

#[async_trait::async_trait]
impl FingerprintRepository for FileFingerprintRepository {
	async fn save(
		&self,
		wallet_id: &str,
		fingerprint: &ChangeFingerprint,
	) -> Result<(), WalletSyncError> {
		tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to create data directory: {}", e))
		})?;

		let content = serde_json::to_string_pretty(fingerprint).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to serialize fingerprint: {}", e))
		})?;

		let filename = self.get_fingerprint_filename(wallet_id);
		tokio::fs::write(&filename, content).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to write fingerprint file: {}", e))
		})?;

		Ok(())
	}

	async fn load(&self, wallet_id: &str) -> Result<Option<ChangeFingerprint>, WalletSyncError> {
		let filename = self.get_fingerprint_filename(wallet_id);

		if !filename.exists() {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(&filename).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to read fingerprint file: {}", e))
		})?;

		let fingerprint: ChangeFingerprint = serde_json::from_str(&content).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to parse fingerprint file: {}", e))
		})?;

		info!("Loaded last-known fingerprint from {:?}", filename);
		Ok(Some(fingerprint))
	}
}
