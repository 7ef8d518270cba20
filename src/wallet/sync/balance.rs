//! Balance snapshot derivation.
//!
//! Pure function from the backend's raw balance report plus the reconciled
//! transaction and pending state to the categorized [`BalanceSnapshot`].
//! All arithmetic is integer zatoshis with saturating operations. The
//! backend report is not trusted to be internally consistent (it may be
//! mid-rescan); a clamp chain guarantees the published invariants
//! `spendable <= verified <= unified_total` and
//! `unified_total = transparent + shielded_spendable + shielded_pending`
//! regardless of input.

use crate::backend::RawBalance;
use crate::wallet::types::{BalanceSnapshot, PendingTransaction, TransactionRecord};

use std::collections::HashSet;

/// Stateless service deriving the categorized balance view.
pub struct BalanceCalculator;

impl BalanceCalculator {
    /// Derive the balance snapshot for one reconciliation pass.
    ///
    /// `canonical` and `pending` must come from the same pass: a pending
    /// entry whose txid is already sighted in `canonical` is not debited
    /// again, which is what prevents an amount counting both as a pending
    /// outgoing and as a confirmed spend in the same published state.
    pub fn compute(
        canonical: &[TransactionRecord],
        pending: &[PendingTransaction],
        raw: &RawBalance,
    ) -> BalanceSnapshot {
        let transparent = raw.transparent;
        let spendable_shielded = raw.spendable_shielded.min(raw.shielded);
        let verified_shielded = raw
            .verified_shielded
            .clamp(spendable_shielded, raw.shielded);

        let total_before_debit = transparent.saturating_add(raw.shielded);
        let verified_before_debit = transparent.saturating_add(verified_shielded);

        // Self-originated sends the backend has not sighted yet are debited
        // locally so the user sees the spend within one fast tick.
        let sighted: HashSet<&str> = canonical.iter().map(|r| r.txid.as_str()).collect();
        let pending_outgoing = pending
            .iter()
            .filter(|p| p.is_active() && !sighted.contains(p.txid.as_str()))
            .fold(0u64, |acc, p| acc.saturating_add(p.amount));

        let unified_total = total_before_debit.saturating_sub(pending_outgoing);
        let transparent = transparent.min(unified_total);
        let verified = verified_before_debit.min(unified_total);
        let shielded_spendable = spendable_shielded.min(verified.saturating_sub(transparent));
        let shielded_pending = unified_total
            .saturating_sub(transparent)
            .saturating_sub(shielded_spendable);
        let unverified = unified_total.saturating_sub(verified);

        BalanceSnapshot {
            transparent,
            shielded_spendable,
            shielded_pending,
            unified_total,
            verified,
            unverified,
        }
    }
}
