//! Backend integration module for the BitcoinZ chain-scanning service
//!
//! This module provides the client and types for talking to the remote
//! lightwalletd-companion backend. The backend owns address derivation, note
//! decryption and transaction building; this client only consumes its query
//! surface (balance, transaction list, sync status) and its send endpoint.

/// JSON-RPC client for the chain-scanning backend
mod client;
/// Type definitions for backend response structures
mod types;

pub use client::{LightwalletdClient, SyncClient};
pub use types::*;
