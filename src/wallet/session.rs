//! Wallet session lifecycle.
//!
//! The original mobile wallet held its client in a process-wide singleton
//! with implicit init/teardown. Here the session is an explicit, constructed
//! service object: `WalletSession::start` restores persisted state, runs the
//! startup reconciliation pass, and spawns the polling scheduler;
//! `shutdown` cancels both cadences deterministically and waits for their
//! tasks. Consumers hold the session, subscribe to snapshots, and go through
//! it for sends.

use crate::backend::SyncClient;
use crate::wallet::sync::orchestrator::{PassTrigger, WalletSyncOrchestrator};
use crate::wallet::sync::pending::PendingConfig;
use crate::wallet::sync::scheduler::{PollingScheduler, SchedulerConfig};
use crate::wallet::sync::state_persistence::StatePersistenceService;
use crate::wallet::sync::events::SyncEventHandler;
use crate::wallet::types::{WalletSnapshot, WalletSyncError};

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Transparent BitcoinZ addresses are base58 strings in this length range.
const TRANSPARENT_ADDR_LEN: std::ops::RangeInclusive<usize> = 26..=36;

/// Session construction parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
	/// Directory for persisted pending/fingerprint state.
	pub data_dir: PathBuf,
	/// Stable identifier separating wallets sharing a data directory.
	pub wallet_id: String,
	pub scheduler: SchedulerConfig,
	pub pending: PendingConfig,
}

impl SessionConfig {
	pub fn new(data_dir: PathBuf) -> Self {
		Self {
			data_dir,
			wallet_id: "default".to_string(),
			scheduler: SchedulerConfig::default(),
			pending: PendingConfig::default(),
		}
	}
}

/// A running wallet session: orchestrator plus polling scheduler.
pub struct WalletSession {
	orchestrator: Arc<WalletSyncOrchestrator>,
	scheduler: PollingScheduler,
	cancel: CancellationToken,
}

impl WalletSession {
	/// Restore state, run the startup pass, and begin polling.
	///
	/// A recoverable startup-pass failure leaves an empty last-good snapshot
	/// and lets polling heal it; only a fatal backend error fails startup.
	pub async fn start(
		client: Arc<dyn SyncClient>,
		config: SessionConfig,
	) -> Result<Self, WalletSyncError> {
		let cancel = CancellationToken::new();
		let persistence = Arc::new(StatePersistenceService::new(
			config.data_dir.clone(),
			config.wallet_id.clone(),
		));
		let orchestrator = Arc::new(WalletSyncOrchestrator::new(
			client,
			persistence,
			config.pending.clone(),
			cancel.clone(),
		));

		orchestrator.restore_persisted().await;
		orchestrator.run_pass(PassTrigger::Startup).await?;

		let scheduler =
			PollingScheduler::start(orchestrator.clone(), config.scheduler.clone(), cancel.clone());

		info!("Wallet session started");
		Ok(Self {
			orchestrator,
			scheduler,
			cancel,
		})
	}

	/// Register a notification handler invoked after every published pass.
	pub async fn register_handler(&self, handler: Box<dyn SyncEventHandler>) {
		self.orchestrator.register_handler(handler).await;
	}

	/// Subscribe to published snapshots.
	pub fn subscribe(&self) -> watch::Receiver<Arc<WalletSnapshot>> {
		self.orchestrator.subscribe()
	}

	/// The most recently published snapshot.
	pub fn snapshot(&self) -> Arc<WalletSnapshot> {
		self.orchestrator.latest_snapshot()
	}

	/// Validate and broadcast a send, tracking it as pending.
	pub async fn send(
		&self,
		to_address: &str,
		amount: u64,
		memo: Option<String>,
	) -> Result<String, WalletSyncError> {
		Self::validate_address(to_address)?;

		if amount == 0 {
			return Err(WalletSyncError::InvalidAmount(
				"amount must be greater than zero".to_string(),
			));
		}

		let spendable = self.snapshot().balance.spendable();
		if amount > spendable {
			return Err(WalletSyncError::InvalidAmount(format!(
				"amount {} exceeds spendable balance {}",
				amount, spendable
			)));
		}

		self.orchestrator
			.send_transaction(to_address, amount, memo)
			.await
	}

	/// Structural address validation before the backend sees the send.
	///
	/// Shielded addresses must decode as bech32 with a `zs` prefix;
	/// transparent addresses are base58 with the usual `t1`/`t3` prefixes.
	fn validate_address(address: &str) -> Result<(), WalletSyncError> {
		if address.starts_with("t1") || address.starts_with("t3") {
			let plausible = TRANSPARENT_ADDR_LEN.contains(&address.len())
				&& address.chars().all(|c| c.is_ascii_alphanumeric());
			if plausible {
				return Ok(());
			}
			return Err(WalletSyncError::InvalidAddress(format!(
				"malformed transparent address: {}",
				address
			)));
		}

		let (hrp, _) = bech32::decode(address).map_err(|e| {
			WalletSyncError::InvalidAddress(format!("not a valid address: {}", e))
		})?;
		if !hrp.as_str().starts_with("zs") {
			return Err(WalletSyncError::InvalidAddress(format!(
				"unexpected address prefix: {}",
				hrp.as_str()
			)));
		}

		Ok(())
	}

	/// True once polling has halted, by shutdown or a fatal error.
	pub fn is_halted(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// End the session: stop both cadences and wait for task teardown.
	pub async fn shutdown(self) {
		info!("Shutting down wallet session");
		self.cancel.cancel();
		self.scheduler.shutdown().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::RawBalance;
	use crate::wallet::sync::testing::{MockSyncClient, test_txid};
	use bech32::{Bech32, Hrp};

	fn shielded_address() -> String {
		bech32::encode::<Bech32>(Hrp::parse("zs").expect("hrp"), &[7u8; 43])
			.expect("bech32 encoding")
	}

	async fn session(mock: Arc<MockSyncClient>, dir: &std::path::Path) -> WalletSession {
		WalletSession::start(mock, SessionConfig::new(dir.to_path_buf()))
			.await
			.expect("session start")
	}

	#[tokio::test(start_paused = true)]
	async fn test_start_publishes_and_shutdown_halts() {
		let mock = Arc::new(MockSyncClient::with_height(42));
		let dir = tempfile::tempdir().expect("tempdir");

		let session = session(mock, dir.path()).await;
		assert_eq!(session.snapshot().chain_height, 42);
		assert!(!session.is_halted());

		session.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_send_validation_rejects_bad_input() {
		let mock = Arc::new(MockSyncClient::with_height(42));
		*mock.balance.lock().unwrap() = RawBalance {
			transparent: 0,
			shielded: 100_000,
			spendable_shielded: 100_000,
			verified_shielded: 100_000,
			unverified_shielded: 0,
		};
		let dir = tempfile::tempdir().expect("tempdir");
		let session = session(mock, dir.path()).await;

		let result = session.send("not-an-address", 1_000, None).await;
		assert!(matches!(result, Err(WalletSyncError::InvalidAddress(_))));

		let result = session.send(&shielded_address(), 0, None).await;
		assert!(matches!(result, Err(WalletSyncError::InvalidAmount(_))));

		// More than spendable.
		let result = session.send(&shielded_address(), 500_000, None).await;
		assert!(matches!(result, Err(WalletSyncError::InvalidAmount(_))));

		session.shutdown().await;
	}

	#[tokio::test(start_paused = true)]
	async fn test_send_happy_path_tracks_pending() {
		let mock = Arc::new(MockSyncClient::with_height(42));
		*mock.balance.lock().unwrap() = RawBalance {
			transparent: 0,
			shielded: 1_000_000,
			spendable_shielded: 1_000_000,
			verified_shielded: 1_000_000,
			unverified_shielded: 0,
		};
		*mock.send_txid.lock().unwrap() = Some(test_txid(5));

		let dir = tempfile::tempdir().expect("tempdir");
		let session = session(mock, dir.path()).await;

		let txid = session
			.send(&shielded_address(), 250_000, Some("thanks".to_string()))
			.await
			.expect("send");
		assert_eq!(txid, test_txid(5));

		let snapshot = session.snapshot();
		assert_eq!(snapshot.pending.len(), 1);
		assert_eq!(snapshot.balance.unified_total, 750_000);

		session.shutdown().await;
	}

	#[test]
	fn test_transparent_address_validation() {
		assert!(WalletSession::validate_address("t1KYZKgRPUvzj2rpwGYrAbMDoTNsDmGDpQ6").is_ok());
		assert!(WalletSession::validate_address("t1short").is_err());
		assert!(WalletSession::validate_address("t1contains-dashes-and-is-longer").is_err());
	}
}
