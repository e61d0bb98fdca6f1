//! Chain collaborators
//!
//! The miner only reads from the chain. [`ChainView`] and [`BalanceView`]
//! describe what it needs; [`InMemoryChain`] implements both for devnets and
//! tests.

use kestrel_consensus::{
    BlockHasher, ConsensusError, KestrelConsensus, Sha256Hasher, genesis_block,
};
use kestrel_primitives::{Address, Block, OutPoint, Transaction};
use parking_lot::RwLock;
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

/// Read access to chain storage.
///
/// Every method returns an owned snapshot. Later chain mutations are not
/// reflected in values already returned.
pub trait ChainView: Send + Sync {
    /// The most recent confirmed block, `None` before genesis.
    fn last_block(&self) -> Option<Block>;

    /// All confirmed blocks, genesis first.
    fn blocks(&self) -> Vec<Block>;

    /// Pending transaction pool, in arrival order.
    fn pending_transactions(&self) -> Vec<Transaction>;

    /// Target the next block's difficulty score must fall below.
    fn difficulty(&self) -> u64;
}

/// Balance lookups, provided by the wallet/operator.
pub trait BalanceView: Send + Sync {
    /// Balance of `address`, `None` if the address has no history.
    fn balance_of(&self, address: &Address) -> Option<u64>;
}

impl<T: ChainView + ?Sized> ChainView for Arc<T> {
    fn last_block(&self) -> Option<Block> {
        (**self).last_block()
    }

    fn blocks(&self) -> Vec<Block> {
        (**self).blocks()
    }

    fn pending_transactions(&self) -> Vec<Transaction> {
        (**self).pending_transactions()
    }

    fn difficulty(&self) -> u64 {
        (**self).difficulty()
    }
}

impl<T: BalanceView + ?Sized> BalanceView for Arc<T> {
    fn balance_of(&self, address: &Address) -> Option<u64> {
        (**self).balance_of(address)
    }
}

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
}

/// Chain storage held in memory.
#[derive(Debug)]
pub struct InMemoryChain<H = Sha256Hasher> {
    consensus: KestrelConsensus<H>,
    state: RwLock<ChainState>,
}

impl InMemoryChain {
    /// Create a chain with the canonical hasher and default difficulty
    /// schedule, starting from genesis.
    pub fn devnet() -> Self {
        Self::new(KestrelConsensus::new())
    }
}

impl<H: BlockHasher> InMemoryChain<H> {
    /// Create a chain starting from the genesis block.
    pub fn new(consensus: KestrelConsensus<H>) -> Self {
        let genesis = genesis_block(consensus.hasher().as_ref());
        Self::from_blocks(consensus, vec![genesis])
    }

    /// Create a chain from existing blocks, which are trusted as-is.
    pub fn from_blocks(consensus: KestrelConsensus<H>, blocks: Vec<Block>) -> Self {
        Self {
            consensus,
            state: RwLock::new(ChainState {
                blocks,
                pending: Vec::new(),
            }),
        }
    }

    /// The consensus rules used to accept blocks
    pub const fn consensus(&self) -> &KestrelConsensus<H> {
        &self.consensus
    }

    /// Number of confirmed blocks
    pub fn height(&self) -> usize {
        self.state.read().blocks.len()
    }

    /// Add a transaction to the pending pool.
    pub fn add_pending_transaction(&self, transaction: Transaction) {
        self.state.write().pending.push(transaction);
    }

    /// Append a mined block.
    ///
    /// The block must extend the current tip and satisfy the current target.
    /// Its transactions leave the pending pool.
    pub fn add_block(&self, block: Block) -> Result<(), ConsensusError> {
        let mut state = self.state.write();
        let target = self.consensus.difficulty_at(state.blocks.len() as u64);
        if let Some(parent) = state.blocks.last() {
            self.consensus.validate_block(&block, parent, target)?;
        }

        let mined: HashSet<_> = block.transactions.iter().map(|tx| tx.id()).collect();
        let before = state.pending.len();
        state.pending.retain(|tx| !mined.contains(&tx.id()));

        debug!(
            target: "kestrel::chain",
            index = block.index,
            hash = %block.hash,
            evicted = before - state.pending.len(),
            "Block appended"
        );
        state.blocks.push(block);
        Ok(())
    }
}

impl<H: BlockHasher> ChainView for InMemoryChain<H> {
    fn last_block(&self) -> Option<Block> {
        self.state.read().blocks.last().cloned()
    }

    fn blocks(&self) -> Vec<Block> {
        self.state.read().blocks.clone()
    }

    fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.read().pending.clone()
    }

    fn difficulty(&self) -> u64 {
        let next_index = self.state.read().blocks.len() as u64;
        self.consensus.difficulty_at(next_index)
    }
}

impl<H: BlockHasher> BalanceView for InMemoryChain<H> {
    fn balance_of(&self, address: &Address) -> Option<u64> {
        let state = self.state.read();
        let spent: HashSet<OutPoint> =
            state
                .blocks
                .iter()
                .flat_map(Block::inputs)
                .map(|input| input.out_point())
                .collect();

        let mut received = false;
        let mut balance = 0u64;
        for tx in state.blocks.iter().flat_map(|block| &block.transactions) {
            for (index, output) in tx.outputs().iter().enumerate() {
                if output.address != *address {
                    continue;
                }
                received = true;
                let out_point = OutPoint {
                    transaction: tx.id(),
                    index: index as u32,
                };
                if !spent.contains(&out_point) {
                    balance = balance.saturating_add(output.amount);
                }
            }
        }

        received.then_some(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use assert_matches::assert_matches;
    use kestrel_consensus::DifficultySchedule;
    use kestrel_primitives::{BlockTemplate, TxInput, TxOutput};

    fn easy_chain() -> InMemoryChain {
        InMemoryChain::new(KestrelConsensus::with_hasher(
            Arc::new(Sha256Hasher),
            DifficultySchedule::constant(u64::MAX),
        ))
    }

    fn next_block(chain: &InMemoryChain, transactions: Vec<Transaction>) -> Block {
        let parent = chain.last_block().unwrap();
        let template =
            BlockTemplate::new(parent.index + 1, parent.hash, 1_700_000_000.0, transactions);
        let hash = Sha256Hasher.hash(&template.preimage());
        template.seal(hash)
    }

    #[test]
    fn test_starts_at_genesis() {
        let chain = InMemoryChain::devnet();
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.last_block().unwrap().index, 0);
        assert!(chain.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_block_evicts_pending() {
        let chain = easy_chain();
        let included = Transaction::regular(B256::repeat_byte(1), Vec::new(), Vec::new());
        let waiting = Transaction::regular(B256::repeat_byte(2), Vec::new(), Vec::new());
        chain.add_pending_transaction(included.clone());
        chain.add_pending_transaction(waiting.clone());

        let block = next_block(&chain, vec![included]);
        chain.add_block(block).unwrap();

        assert_eq!(chain.height(), 2);
        assert_eq!(chain.pending_transactions(), vec![waiting]);
    }

    #[test]
    fn test_add_block_rejects_bad_parent() {
        let chain = easy_chain();
        let mut block = next_block(&chain, Vec::new());
        block.index = 7;

        assert_matches!(chain.add_block(block), Err(ConsensusError::IndexMismatch { .. }));
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_balance_tracks_unspent_outputs() {
        let chain = easy_chain();
        let alice = B256::repeat_byte(0xa1);
        let bob = B256::repeat_byte(0xb0);
        assert_eq!(chain.balance_of(&alice), None);

        let reward = Transaction::stake(alice, 50);
        let reward_id = reward.id();
        chain.add_block(next_block(&chain, vec![reward])).unwrap();
        assert_eq!(chain.balance_of(&alice), Some(50));

        let spend = Transaction::regular(
            B256::repeat_byte(3),
            vec![TxInput::new(reward_id, 0)],
            vec![TxOutput::new(20, bob), TxOutput::new(30, alice)],
        );
        chain.add_block(next_block(&chain, vec![spend])).unwrap();

        assert_eq!(chain.balance_of(&alice), Some(30));
        assert_eq!(chain.balance_of(&bob), Some(20));
    }

    #[test]
    fn test_difficulty_follows_height() {
        let chain = InMemoryChain::devnet();
        assert_eq!(chain.difficulty(), chain.consensus().difficulty_at(1));
    }
}
