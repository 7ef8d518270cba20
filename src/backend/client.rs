//!
//! JSON-RPC client for the BitcoinZ chain-scanning backend.
//!
//! This module provides an async client for the backend's query and send
//! endpoints. Queries are idempotent and wrapped in a short bounded retry;
//! the send endpoint is never retried. All methods are async and designed
//! for use with Tokio.

use super::types::*;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call HTTP timeout; a timed-out call is a transient failure.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the inline retry window for idempotent queries. Anything
/// that fails past this is left for the next scheduled tick.
const RETRY_WINDOW: Duration = Duration::from_secs(5);

/// Query and send surface of the chain-scanning backend.
///
/// The backend owns keys, note decryption and transaction construction; this
/// trait is the whole boundary the sync engine sees. Implemented by
/// [`LightwalletdClient`] for production and by scripted mocks in tests.
#[async_trait::async_trait]
pub trait SyncClient: Send + Sync {
	/// Fetch the categorized balance report.
	async fn get_balance(&self) -> Result<RawBalance, BackendError>;

	/// Fetch the full raw transaction list, skipping malformed entries.
	async fn get_transactions(&self) -> Result<Vec<RawTransaction>, BackendError>;

	/// Trigger or advance a backend rescan and report its status.
	async fn sync(&self) -> Result<RawSyncStatus, BackendError>;

	/// Report rescan progress without advancing it.
	async fn sync_status(&self) -> Result<RawSyncStatus, BackendError>;

	/// Broadcast a transaction, returning its txid on success.
	async fn send_transaction(
		&self,
		to_address: &str,
		amount: u64,
		memo: Option<String>,
	) -> Result<String, BackendError>;
}

/// HTTP JSON-RPC client for the backend gateway
#[derive(Clone)]
pub struct LightwalletdClient {
	/// The underlying HTTP client for RPC calls.
	http_client: Client,
	/// The base URL of the backend RPC endpoint.
	server_url: String,
}

impl LightwalletdClient {
	/// Create a new backend client for the given RPC endpoint.
	pub fn new(server_url: String) -> Self {
		let http_client = Client::builder()
			.timeout(REQUEST_TIMEOUT)
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			server_url,
		}
	}

	/// Execute a single RPC call and unwrap the `result` payload.
	async fn call(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, BackendError> {
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": method,
			"params": params,
		});

		debug!("RPC call: {}", method);

		let response = self
			.http_client
			.post(&self.server_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(BackendError::Malformed(format!(
				"HTTP status {} from {}",
				response.status(),
				method
			)));
		}

		let response_json: serde_json::Value = response.json().await?;

		if let Some(error) = response_json.get("error") {
			let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
			let message = error
				.get("message")
				.and_then(|m| m.as_str())
				.unwrap_or("unknown backend error")
				.to_string();

			if code == RPC_WALLET_CORRUPT {
				return Err(BackendError::WalletCorrupt(message));
			}
			return Err(BackendError::Rpc { code, message });
		}

		response_json
			.get("result")
			.cloned()
			.ok_or(BackendError::NoData)
	}

	/// Execute an idempotent query with a short bounded retry on transient
	/// HTTP failures. RPC-level errors are permanent and surface immediately.
	async fn query(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<serde_json::Value, BackendError> {
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(RETRY_WINDOW),
			..ExponentialBackoff::default()
		};

		backoff::future::retry(policy, || {
			let attempt = self.call(method, params.clone());
			async move {
				attempt.await.map_err(|e| {
					if e.is_transient() {
						warn!("Transient backend failure on {}: {}", method, e);
						backoff::Error::transient(e)
					} else {
						backoff::Error::permanent(e)
					}
				})
			}
		})
		.await
	}

	/// Probe the backend's identity and tip height. Used at startup to
	/// validate a server before polling begins.
	pub async fn server_info(&self) -> Result<ServerInfo, BackendError> {
		let result = self.query("getinfo", json!([])).await?;
		Ok(serde_json::from_value(result)?)
	}
}

#[async_trait::async_trait]
impl SyncClient for LightwalletdClient {
	async fn get_balance(&self) -> Result<RawBalance, BackendError> {
		let result = self.query("balance", json!([])).await?;
		Ok(serde_json::from_value(result)?)
	}

	async fn get_transactions(&self) -> Result<Vec<RawTransaction>, BackendError> {
		let result = self.query("list", json!([])).await?;

		let entries = result
			.as_array()
			.ok_or_else(|| BackendError::Malformed("transaction list is not an array".to_string()))?;

		// A malformed entry must not abort the whole pass; skip and log.
		let mut transactions = Vec::with_capacity(entries.len());
		for entry in entries {
			match serde_json::from_value::<RawTransaction>(entry.clone()) {
				Ok(tx) => transactions.push(tx),
				Err(e) => warn!("Skipping malformed transaction entry: {}", e),
			}
		}

		Ok(transactions)
	}

	async fn sync(&self) -> Result<RawSyncStatus, BackendError> {
		let result = self.query("sync", json!([])).await?;
		Ok(serde_json::from_value(result)?)
	}

	async fn sync_status(&self) -> Result<RawSyncStatus, BackendError> {
		let result = self.query("syncstatus", json!([])).await?;
		Ok(serde_json::from_value(result)?)
	}

	async fn send_transaction(
		&self,
		to_address: &str,
		amount: u64,
		memo: Option<String>,
	) -> Result<String, BackendError> {
		// Broadcasts are not idempotent; never retried.
		let result = self
			.call("send", json!([to_address, amount, memo]))
			.await?;

		let response: SendResponse = serde_json::from_value(result)?;
		Ok(response.txid)
	}
}
