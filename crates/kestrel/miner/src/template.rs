//! Block template building
//!
//! A template contains everything a block needs except a valid nonce and
//! hash, which the proof-of-work search supplies. Its body is laid out as:
//! 1. up to `transactions_per_block` selected pool transactions
//! 2. one fee transaction, if anything was selected
//! 3. one stake transaction, if a reward address was given

use crate::{
    ChainView, MinerConfig, MiningError,
    selector::{Selection, TransactionSelector},
};
use kestrel_primitives::{Address, Block, BlockTemplate, Transaction, unix_timestamp};
use tracing::debug;

/// Builds unmined block templates on top of the chain tip.
#[derive(Debug, Clone, Copy)]
pub struct BlockTemplateBuilder {
    selector: TransactionSelector,
    fee_per_transaction: u64,
    bootstrap_reward: u64,
    bootstrap_height: u64,
}

impl BlockTemplateBuilder {
    /// Create a builder from the miner configuration
    pub const fn new(config: &MinerConfig) -> Self {
        Self {
            selector: TransactionSelector::new(config.transactions_per_block),
            fee_per_transaction: config.fee_per_transaction,
            bootstrap_reward: config.bootstrap_reward,
            bootstrap_height: config.bootstrap_height,
        }
    }

    /// The transaction selector in use
    pub const fn selector(&self) -> &TransactionSelector {
        &self.selector
    }

    /// Build a template on top of `chain`'s last block.
    ///
    /// `reward` is the stake amount; blocks below the bootstrap height get
    /// the bootstrap reward instead.
    pub fn build<C: ChainView + ?Sized>(
        &self,
        chain: &C,
        reward_address: Option<Address>,
        fee_address: Address,
        reward: u64,
    ) -> Result<BlockTemplate, MiningError> {
        let parent = chain.last_block().ok_or(MiningError::NoLastBlock)?;
        let pool = chain.pending_transactions();
        let history = chain.blocks();

        Ok(self.build_on(&parent, &pool, &history, reward_address, fee_address, reward))
    }

    /// Build a template on top of `parent` from explicit pool and history
    /// snapshots.
    pub fn build_on(
        &self,
        parent: &Block,
        pool: &[Transaction],
        history: &[Block],
        reward_address: Option<Address>,
        fee_address: Address,
        reward: u64,
    ) -> BlockTemplate {
        let index = parent.index + 1;
        let timestamp = unix_timestamp();

        let Selection { mut selected, .. } = self.selector.select(pool, history);

        if !selected.is_empty() {
            let fee = self.fee_per_transaction * selected.len() as u64;
            selected.push(Transaction::fee(fee_address, fee));
        }

        let reward = if index < self.bootstrap_height { self.bootstrap_reward } else { reward };
        debug!(target: "kestrel::miner", index, reward, "Reward for next block");

        if let Some(address) = reward_address {
            selected.push(Transaction::stake(address, reward));
        }

        BlockTemplate::new(index, parent.hash, timestamp, selected)
    }
}

impl Default for BlockTemplateBuilder {
    fn default() -> Self {
        Self::new(&MinerConfig::default())
    }
}
