//! Canonical transaction list construction.
//!
//! The backend's raw transaction list is noisy: the same `(txid, direction)`
//! pair can appear several times with different levels of completeness, memo
//! fragments trickle in across passes, and a self-send shows up as a debit
//! and a credit leg that would read as duplicate noise in a UI list. The
//! `TransactionReconciler` turns that list plus the current chain height into
//! the canonical, deduplicated, display-ordered record list.

use crate::backend::{RawTransaction, TxDirection};
use crate::wallet::sync::memo::MemoAssembler;
use crate::wallet::types::TransactionRecord;

use std::collections::HashMap;
use tracing::warn;

/// Expected txid length in hex characters.
const TXID_HEX_LEN: usize = 64;

/// Stateless service producing the canonical transaction list.
pub struct TransactionReconciler;

impl TransactionReconciler {
	/// Reconcile the full raw list against the current chain height.
	///
	/// Malformed entries are skipped and logged rather than aborting the
	/// pass. The result is deterministic for identical input.
	pub fn reconcile(raw: &[RawTransaction], current_height: u64) -> Vec<TransactionRecord> {
		let mut merged: HashMap<(String, TxDirection), RawTransaction> = HashMap::new();

		for entry in raw {
			if let Err(reason) = Self::validate(entry) {
				warn!("Skipping malformed transaction entry: {}", reason);
				continue;
			}

			merged
				.entry((entry.txid.clone(), entry.direction))
				.and_modify(|existing| Self::merge_into(existing, entry))
				.or_insert_with(|| entry.clone());
		}

		Self::collapse_self_sends(&mut merged);

		let mut records: Vec<TransactionRecord> = merged
			.into_values()
			.map(|entry| Self::to_record(entry, current_height))
			.collect();

		// Display order: newest first; txid and direction break ties so the
		// output is stable across passes.
		records.sort_by(|a, b| {
			b.timestamp
				.cmp(&a.timestamp)
				.then_with(|| a.txid.cmp(&b.txid))
				.then_with(|| a.direction.cmp(&b.direction))
		});

		records
	}

	fn validate(entry: &RawTransaction) -> Result<(), String> {
		if entry.txid.len() != TXID_HEX_LEN {
			return Err(format!("txid has length {}", entry.txid.len()));
		}
		if hex::decode(&entry.txid).is_err() {
			return Err(format!("txid is not hex: {}", entry.txid));
		}
		if entry.timestamp < 0 {
			return Err(format!("negative timestamp on {}", entry.txid));
		}
		Ok(())
	}

	/// Merge a later sighting of the same `(txid, direction)` into the
	/// existing one, preferring the most complete and most recent fields.
	fn merge_into(existing: &mut RawTransaction, newer: &RawTransaction) {
		if newer.block_height.is_some() {
			existing.block_height = newer.block_height;
		}
		if newer.fee.is_some() {
			existing.fee = newer.fee;
		}
		if newer.from_address.is_some() {
			existing.from_address = newer.from_address.clone();
		}
		if newer.to_address.is_some() {
			existing.to_address = newer.to_address.clone();
		}
		existing.timestamp = existing.timestamp.max(newer.timestamp);

		// A mined sighting carries the authoritative amount.
		if newer.block_height.is_some() {
			existing.amount = newer.amount;
		}

		// Union of fragments; the assembler deduplicates by index.
		for fragment in &newer.memo_fragments {
			if !existing.memo_fragments.iter().any(|f| f.index == fragment.index) {
				existing.memo_fragments.push(fragment.clone());
			}
		}
	}

	/// Collapse self-send pairs into a single fee-only entry.
	///
	/// Structural rule only: the pair collapses iff the debit and credit
	/// cancel exactly (beyond the known fee) and neither leg carries an
	/// assembled memo. Same-owner transfers with a real memo keep both legs.
	fn collapse_self_sends(merged: &mut HashMap<(String, TxDirection), RawTransaction>) {
		let paired: Vec<String> = merged
			.keys()
			.filter(|(txid, direction)| {
				*direction == TxDirection::Sent
					&& merged.contains_key(&(txid.clone(), TxDirection::Received))
			})
			.map(|(txid, _)| txid.clone())
			.collect();

		for txid in paired {
			let sent_key = (txid.clone(), TxDirection::Sent);
			let received_key = (txid.clone(), TxDirection::Received);

			let cancels = {
				let sent = &merged[&sent_key];
				let received = &merged[&received_key];

				let net_cancels = match sent.fee {
					Some(fee) => Some(sent.amount) == received.amount.checked_add(fee),
					None => sent.amount == received.amount,
				};

				net_cancels
					&& MemoAssembler::assemble(&sent.memo_fragments).is_none()
					&& MemoAssembler::assemble(&received.memo_fragments).is_none()
			};

			if cancels {
				merged.remove(&received_key);
				if let Some(sent) = merged.get_mut(&sent_key) {
					let fee = sent.fee.unwrap_or(0);
					sent.amount = 0;
					sent.fee = Some(fee);
					sent.memo_fragments.clear();
				}
			}
		}
	}

	fn confirmations(block_height: Option<u64>, current_height: u64) -> u64 {
		match block_height {
			Some(height) => (current_height + 1).saturating_sub(height),
			None => 0,
		}
	}

	fn to_record(entry: RawTransaction, current_height: u64) -> TransactionRecord {
		let confirmations = Self::confirmations(entry.block_height, current_height);
		let memo = MemoAssembler::assemble(&entry.memo_fragments);

		TransactionRecord {
			txid: entry.txid,
			direction: entry.direction,
			amount: entry.amount,
			fee: entry.fee,
			from_address: entry.from_address,
			to_address: entry.to_address,
			block_height: entry.block_height,
			timestamp: entry.timestamp,
			memo,
			confirmations,
		}
	}
}
