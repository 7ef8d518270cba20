//! Wallet State Synchronization Module
//!
//! This module provides all the core logic and services for keeping a local view of a BitcoinZ
//! wallet consistent with the remote chain-scanning backend.
//! It is composed of several submodules, each responsible for a specific aspect of the sync process:
//!
//! - `orchestrator`: Runs one full reconciliation pass and publishes immutable snapshots. It wires together all services.
//! - `scheduler`: Drives the fast (fingerprint) and slow (forced) polling cadences with cooperative cancellation.
//! - `fingerprint`: Cheap change detection that gates fast-tick escalation to a full pass.
//! - `reconciler`: Merges raw backend entries into the canonical, deduplicated transaction list.
//! - `pending`: Tracks wallet-originated transactions until sighted or expired.
//! - `balance`: Derives the categorized balance snapshot from reconciled state.
//! - `memo`: Reassembles multi-fragment encrypted memos.
//! - `status`: Tracks pass statistics and connectivity health.
//! - `events`: Defines the event types and handler traits used for decoupled notification of consumers.
//! - `repositories` / `state_persistence`: Persist pending entries and the last fingerprint across restarts.
//!
//! The orchestrator coordinates the pass: it queries the backend, reconciles transactions and
//! pending entries against the same canonical set, derives the balance, and swaps in a new
//! snapshot wholesale. At most one pass is ever in flight; concurrent ticks coalesce.
//!
//! All submodules are designed to be modular and testable, with clear interfaces and responsibilities.

/// Balance snapshot derivation
pub mod balance;
/// Event system for decoupled notification of consumers
pub mod events;
/// Cheap change detection for the fast cadence
pub mod fingerprint;
/// Multi-fragment memo reassembly
pub mod memo;
/// Main coordinator for the reconciliation pass
pub mod orchestrator;
/// Pending transaction lifecycle tracking
pub mod pending;
/// Canonical transaction list construction
pub mod reconciler;
/// File-backed persistence repositories
pub mod repositories;
/// Dual-cadence polling driver
pub mod scheduler;
/// Persistence service over the repositories
pub mod state_persistence;
/// Pass statistics and connectivity health
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::*;
