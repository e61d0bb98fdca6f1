//! Transaction selection
//!
//! Picks the pool transactions that can go into the next block without
//! double-spending. A transaction is rejected when any of its inputs spends an
//! output that is already spent by
//! - a transaction selected earlier in the same pass, or
//! - any transaction in a confirmed block.
//!
//! The pass is single and forward: a rejection never revisits earlier
//! decisions. The cap is applied after the pass, so a transaction can be
//! rejected because of a conflict with a selected transaction that is later
//! cut by the cap.

use kestrel_primitives::{Block, OutPoint, Transaction};
use std::collections::HashSet;
use tracing::info;

/// Outcome of one selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Selected transactions in pool order, capped
    pub selected: Vec<Transaction>,
    /// Transactions with at least one conflicting input, in pool order
    pub rejected: Vec<Transaction>,
    /// Number of conflict-free transactions before the cap was applied
    pub eligible: usize,
}

/// Double-spend-safe pool transaction selector.
#[derive(Debug, Clone, Copy)]
pub struct TransactionSelector {
    /// Maximum number of selected transactions kept
    limit: usize,
}

impl TransactionSelector {
    /// Create a selector keeping at most `limit` transactions
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Selection cap
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Select from `pool` against the confirmed `history`.
    ///
    /// Neither input is modified; selected transactions are copies.
    pub fn select(&self, pool: &[Transaction], history: &[Block]) -> Selection {
        let confirmed: HashSet<OutPoint> = history
            .iter()
            .flat_map(Block::inputs)
            .map(|input| input.out_point())
            .collect();
        let mut claimed: HashSet<OutPoint> = HashSet::new();

        let mut selected = Vec::new();
        let mut rejected = Vec::new();
        for tx in pool {
            let conflicting = tx.inputs().iter().any(|input| {
                let out_point = input.out_point();
                claimed.contains(&out_point) || confirmed.contains(&out_point)
            });

            if conflicting {
                rejected.push(tx.clone());
            } else {
                claimed.extend(tx.inputs().iter().map(|input| input.out_point()));
                selected.push(tx.clone());
            }
        }

        info!(
            target: "kestrel::selector",
            selected = selected.len(),
            rejected = rejected.len(),
            "Selected candidate transactions"
        );

        let eligible = selected.len();
        selected.truncate(self.limit);
        Selection { selected, rejected, eligible }
    }
}

impl Default for TransactionSelector {
    fn default() -> Self {
        Self::new(crate::config::TRANSACTIONS_PER_BLOCK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use kestrel_primitives::{BlockTemplate, TxInput, TxOutput};
    use proptest::prelude::*;

    fn spend(id: u8, inputs: &[(u8, u32)]) -> Transaction {
        Transaction::regular(
            B256::repeat_byte(id),
            inputs.iter().map(|&(tx, index)| TxInput::new(B256::repeat_byte(tx), index)).collect(),
            vec![TxOutput::new(1, B256::repeat_byte(0xee))],
        )
    }

    fn block_with(transactions: Vec<Transaction>) -> Block {
        BlockTemplate::new(1, B256::ZERO, 0.0, transactions).seal(B256::repeat_byte(0x11))
    }

    #[test]
    fn test_empty_pool() {
        let selection = TransactionSelector::default().select(&[], &[]);
        assert!(selection.selected.is_empty());
        assert!(selection.rejected.is_empty());
        assert_eq!(selection.eligible, 0);
    }

    #[test]
    fn test_conflict_with_selected_is_rejected_and_cap_applies() {
        let tx1 = spend(1, &[(0xa0, 0)]);
        let tx2 = spend(2, &[(0xa1, 0)]);
        let tx3 = spend(3, &[(0xa0, 0)]);

        let selection =
            TransactionSelector::default().select(&[tx1.clone(), tx2.clone(), tx3.clone()], &[]);

        assert_eq!(selection.selected, vec![tx1, tx2]);
        assert_eq!(selection.rejected, vec![tx3]);
    }

    #[test]
    fn test_conflict_with_history_is_rejected() {
        let confirmed = spend(9, &[(0xa0, 1)]);
        let history = vec![block_with(vec![confirmed])];

        let replay = spend(1, &[(0xa0, 1)]);
        let other_output = spend(2, &[(0xa0, 0)]);
        let selection = TransactionSelector::default()
            .select(&[replay.clone(), other_output.clone()], &history);

        assert_eq!(selection.selected, vec![other_output]);
        assert_eq!(selection.rejected, vec![replay]);
    }

    #[test]
    fn test_rejection_counts_conflicts_beyond_cap() {
        let pool = vec![
            spend(1, &[(0xa0, 0)]),
            spend(2, &[(0xa1, 0)]),
            spend(3, &[(0xa2, 0)]),
            spend(4, &[(0xa2, 0)]),
        ];

        let selection = TransactionSelector::default().select(&pool, &[]);

        assert_eq!(selection.eligible, 3);
        assert_eq!(selection.selected, pool[..2].to_vec());
        // Conflicts with the third transaction, which the cap dropped.
        assert_eq!(selection.rejected, vec![pool[3].clone()]);
    }

    #[test]
    fn test_input_free_transactions_never_conflict() {
        let pool = vec![spend(1, &[]), spend(2, &[])];
        let selection = TransactionSelector::new(10).select(&pool, &[]);
        assert_eq!(selection.selected.len(), 2);
    }

    fn arb_pool() -> impl Strategy<Value = Vec<Transaction>> {
        prop::collection::vec(prop::collection::vec((0u8..6, 0u32..3), 0..4), 0..12).prop_map(
            |txs| {
                txs.iter()
                    .enumerate()
                    .map(|(id, inputs)| spend(id as u8 + 0x40, inputs))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn selection_never_double_spends(
            pool in arb_pool(),
            history_inputs in prop::collection::vec((0u8..6, 0u32..3), 0..6),
            limit in 0usize..5,
        ) {
            let history = vec![block_with(vec![spend(0x30, &history_inputs)])];
            let selection = TransactionSelector::new(limit).select(&pool, &history);

            prop_assert!(selection.selected.len() <= limit);
            prop_assert_eq!(selection.eligible + selection.rejected.len(), pool.len());

            let confirmed: HashSet<OutPoint> = history
                .iter()
                .flat_map(Block::inputs)
                .map(|input| input.out_point())
                .collect();
            let mut seen = HashSet::new();
            for tx in &selection.selected {
                let mut own = HashSet::new();
                for input in tx.inputs() {
                    let out_point = input.out_point();
                    prop_assert!(!confirmed.contains(&out_point));
                    prop_assert!(!seen.contains(&out_point));
                    own.insert(out_point);
                }
                seen.extend(own);
            }
        }
    }
}
