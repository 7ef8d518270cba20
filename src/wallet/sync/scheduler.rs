//! Dual-cadence polling driver.
//!
//! Two independent periodic tasks share one orchestrator: the fast cadence
//! (default 1s) probes the change fingerprint and escalates to a full pass
//! only when it moved; the slow cadence (default 60s) forces a full pass
//! unconditionally, guaranteeing convergence even when the fingerprint
//! misses a change. Neither cadence overlaps itself: a tick that is still
//! executing when the next is due causes that tick to be skipped, not
//! queued, and the orchestrator's pass guard coalesces ticks across the two
//! cadences. Cancellation is cooperative and checked before every pass; a
//! fatal pass error cancels the shared token, halting both cadences.

use crate::wallet::sync::orchestrator::{PassTrigger, WalletSyncOrchestrator};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Cadence configuration for the polling scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
	/// Fingerprint probe cadence.
	pub fast_interval: Duration,
	/// Forced full-pass cadence.
	pub slow_interval: Duration,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			fast_interval: Duration::from_secs(1),
			slow_interval: Duration::from_secs(60),
		}
	}
}

/// Handle owning the two polling tasks.
pub struct PollingScheduler {
	cancel: CancellationToken,
	fast_handle: JoinHandle<()>,
	slow_handle: JoinHandle<()>,
}

impl PollingScheduler {
	/// Spawn both cadences against the given orchestrator.
	///
	/// The token is shared: cancelling it (from shutdown or from a fatal
	/// pass error) stops both cadences deterministically.
	pub fn start(
		orchestrator: Arc<WalletSyncOrchestrator>,
		config: SchedulerConfig,
		cancel: CancellationToken,
	) -> Self {
		info!(
			"Starting polling scheduler (fast {:?}, slow {:?})",
			config.fast_interval, config.slow_interval
		);

		let fast_handle = tokio::spawn(Self::run_cadence(
			orchestrator.clone(),
			config.fast_interval,
			PassTrigger::FastTick,
			cancel.clone(),
		));
		let slow_handle = tokio::spawn(Self::run_cadence(
			orchestrator,
			config.slow_interval,
			PassTrigger::SlowTick,
			cancel.clone(),
		));

		Self {
			cancel,
			fast_handle,
			slow_handle,
		}
	}

	async fn run_cadence(
		orchestrator: Arc<WalletSyncOrchestrator>,
		period: Duration,
		trigger: PassTrigger,
		cancel: CancellationToken,
	) {
		let mut interval = tokio::time::interval(period);
		// A tick that is still executing when the next is due skips it.
		interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
		// Consume the immediate first tick; the startup pass already ran.
		interval.tick().await;

		loop {
			tokio::select! {
				_ = cancel.cancelled() => {
					debug!("{:?} cadence cancelled", trigger);
					break;
				}
				_ = interval.tick() => {
					if cancel.is_cancelled() {
						break;
					}

					match orchestrator.run_pass(trigger).await {
						Ok(outcome) => {
							debug!("{:?} tick outcome: {:?}", trigger, outcome);
						}
						Err(e) => {
							error!(
								"Fatal error on {:?} tick, halting polling: {}",
								trigger, e
							);
							cancel.cancel();
							break;
						}
					}
				}
			}
		}
	}

	/// True once polling has been halted, by shutdown or a fatal error.
	pub fn is_halted(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Stop both cadences and wait for their tasks to finish.
	pub async fn shutdown(self) {
		self.cancel.cancel();
		let _ = self.fast_handle.await;
		let _ = self.slow_handle.await;
		info!("Polling scheduler stopped");
	}
}
