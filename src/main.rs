mod backend;
mod utils;
mod wallet;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::backend::LightwalletdClient;
use crate::utils::{format_token_amount, short_txid};
use crate::wallet::sync::events::{SyncEvent, SyncEventHandler};
use crate::wallet::{BTCZ_TOKEN_DECIMALS, WalletSession, WalletSyncError};
use crate::wallet::session::SessionConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	// Initialize tracing subscriber; RUST_LOG overrides the default level
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting BitcoinZ wallet state sync service");

	let server_url = std::env::var("BITCOINZ_BACKEND_URL")
		.unwrap_or_else(|_| "http://127.0.0.1:8232".to_string());
	let data_dir = std::env::var("BITCOINZ_DATA_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|_| PathBuf::from("./wallet-data"));

	let client = LightwalletdClient::new(server_url.clone());

	// Probe the server before polling begins.
	match client.server_info().await {
		Ok(server) => {
			info!(
				"Connected to {} {} (chain {}, height {})",
				server.vendor, server.version, server.chain_name, server.block_height
			);
		}
		Err(e) => {
			error!("Failed to reach backend at {}: {}", server_url, e);
			return;
		}
	}

	let session =
		match WalletSession::start(Arc::new(client), SessionConfig::new(data_dir)).await {
			Ok(session) => session,
			Err(e) => {
				error!("Failed to start wallet session: {:?}", e);
				return;
			}
		};

	session
		.register_handler(Box::new(LoggingNotificationHandler))
		.await;

	info!("Session running, press Ctrl-C to stop");

	let mut snapshots = session.subscribe();
	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => break,
			changed = snapshots.changed() => {
				if changed.is_err() {
					break;
				}
				let snapshot = snapshots.borrow_and_update().clone();
				debug!("Snapshot published at height {}", snapshot.chain_height);
				if session.is_halted() {
					break;
				}
			}
		}
	}

	if session.is_halted() {
		warn!("Polling halted on a fatal error, session requires re-initialization");
	}

	let snapshot = session.snapshot();
	info!(
		"Final state: {} BTCZ across {} transactions ({} passes, last synced {:?})",
		format_token_amount(snapshot.balance.unified_total, BTCZ_TOKEN_DECIMALS),
		snapshot.transactions.len(),
		snapshot.health.passes_completed,
		snapshot.synced_at
	);

	session.shutdown().await;
}

/// Notification handler that logs published wallet state changes.
struct LoggingNotificationHandler;

#[async_trait::async_trait]
impl SyncEventHandler for LoggingNotificationHandler {
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError> {
		match event {
			SyncEvent::SnapshotPublished {
				snapshot,
				new_transactions,
				changed,
			} => {
				if *changed {
					info!(
						"Wallet updated: {} BTCZ total, {} new transactions, {} pending",
						format_token_amount(snapshot.balance.unified_total, BTCZ_TOKEN_DECIMALS),
						new_transactions.len(),
						snapshot.pending.len()
					);
				}
			}
			SyncEvent::PassFailed { error, .. } => {
				warn!("Reconciliation pass failed: {}", error);
			}
			SyncEvent::PendingExpired { txid } => {
				warn!(
					"Send {} not confirmed within timeout, it may have failed",
					short_txid(txid)
				);
			}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"LoggingNotificationHandler"
	}
}
