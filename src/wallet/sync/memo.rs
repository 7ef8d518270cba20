//! Memo reassembly for wallet synchronization.
//!
//! A memo longer than one on-chain memo field arrives from the backend as
//! several index-tagged fragments, possibly spread across reconciliation
//! passes and in arbitrary order. This module provides the `MemoAssembler`,
//! which concatenates a fragment set into the logical message only once the
//! set is contiguous and complete. An incomplete set is "memo pending", not
//! an error; a later pass supplies the missing fragment.

use crate::backend::RawMemoFragment;

use itertools::Itertools;
use tracing::debug;

/// Service for reassembling multi-fragment encrypted memos.
pub struct MemoAssembler;

impl MemoAssembler {
    /// Assemble a fragment set into the full memo.
    ///
    /// Returns `None` unless indices `0..n-1` are all present with no gaps.
    /// Duplicate indices are tolerated; the first payload seen for an index
    /// wins.
    pub fn assemble(fragments: &[RawMemoFragment]) -> Option<String> {
        if fragments.is_empty() {
            return None;
        }

        let ordered: Vec<&RawMemoFragment> = fragments
            .iter()
            .sorted_by_key(|f| f.index)
            .dedup_by(|a, b| a.index == b.index)
            .collect();

        // Complete means exactly 0..n-1 after deduplication.
        let contiguous = ordered
            .iter()
            .enumerate()
            .all(|(position, fragment)| fragment.index as usize == position);

        if !contiguous {
            debug!(
                "Memo incomplete: {} fragments, indices {:?}",
                ordered.len(),
                ordered.iter().map(|f| f.index).collect::<Vec<_>>()
            );
            return None;
        }

        let memo: String = ordered.iter().map(|f| f.payload.as_str()).collect();
        if memo.is_empty() { None } else { Some(memo) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(index: u32, payload: &str) -> RawMemoFragment {
        RawMemoFragment {
            index,
            payload: payload.to_string(),
        }
    }

    #[test]
    fn test_single_fragment() {
        let memo = MemoAssembler::assemble(&[fragment(0, "hello")]);
        assert_eq!(memo, Some("hello".to_string()));
    }

    #[test]
    fn test_out_of_order_arrival() {
        let memo = MemoAssembler::assemble(&[
            fragment(2, " world"),
            fragment(0, "hello"),
            fragment(1, ","),
        ]);
        assert_eq!(memo, Some("hello, world".to_string()));
    }

    #[test]
    fn test_gap_yields_nothing() {
        // [0, 2] is missing the middle fragment; no partial memo may leak out.
        let memo = MemoAssembler::assemble(&[fragment(0, "hello"), fragment(2, "world")]);
        assert_eq!(memo, None);
    }

    #[test]
    fn test_missing_first_fragment() {
        let memo = MemoAssembler::assemble(&[fragment(1, "tail")]);
        assert_eq!(memo, None);
    }

    #[test]
    fn test_duplicate_index_tolerated() {
        let memo = MemoAssembler::assemble(&[
            fragment(0, "a"),
            fragment(1, "b"),
            fragment(1, "b"),
        ]);
        assert_eq!(memo, Some("ab".to_string()));
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(MemoAssembler::assemble(&[]), None);
    }
}
