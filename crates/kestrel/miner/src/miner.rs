//! Mining orchestration
//!
//! [`Miner::mine`] computes the reward, builds a template on the current
//! tip, then dispatches the template and the chain's current difficulty to a
//! worker thread. Template construction finishes before dispatch; the worker
//! never sees chain changes made afterwards.
//!
//! Overlapping calls are allowed and run independent searches. Callers that
//! need one search at a time should go through [`crate::MiningService`].

use crate::{
    BalanceView, BlockTemplateBuilder, ChainView, MinerConfig, MiningError, MiningJob,
    ProofOfWorkEngine, RewardCalculator, spawn_worker,
};
use kestrel_consensus::{BlockHasher, Sha256Hasher};
use kestrel_primitives::{Address, BlockTemplate, TransactionKind};
use std::{collections::BTreeMap, sync::Arc};
use tracing::info;

/// Builds block templates and dispatches them for proof of work.
#[derive(Debug)]
pub struct Miner<C, B, H = Sha256Hasher> {
    chain: Arc<C>,
    balances: Arc<B>,
    engine: ProofOfWorkEngine<H>,
    builder: BlockTemplateBuilder,
    rewards: RewardCalculator,
}

impl<C, B, H> Clone for Miner<C, B, H> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            balances: Arc::clone(&self.balances),
            engine: self.engine.clone(),
            builder: self.builder,
            rewards: self.rewards.clone(),
        }
    }
}

impl<C, B, H> Miner<C, B, H>
where
    C: ChainView,
    B: BalanceView,
    H: BlockHasher,
{
    /// Create a miner over the given collaborators
    pub fn new(chain: Arc<C>, balances: Arc<B>, hasher: Arc<H>, config: &MinerConfig) -> Self {
        Self {
            chain,
            balances,
            engine: ProofOfWorkEngine::new(hasher),
            builder: BlockTemplateBuilder::new(config),
            rewards: RewardCalculator::new(config.bonus_stages.clone()),
        }
    }

    /// The chain this miner builds on
    pub const fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    /// Reward the next block would pay to `address`, before the bootstrap
    /// override.
    pub fn calculate_reward(&self, address: Option<&Address>) -> Result<u64, MiningError> {
        let balance = address.and_then(|address| self.balances.balance_of(address));
        self.rewards.calculate(address, balance, self.chain.last_block().as_ref())
    }

    /// Build the next block template without mining it.
    pub fn build_template(
        &self,
        reward_address: Option<Address>,
        fee_address: Address,
    ) -> Result<BlockTemplate, MiningError> {
        let reward = self.calculate_reward(reward_address.as_ref())?;
        self.builder.build(self.chain.as_ref(), reward_address, fee_address, reward)
    }

    /// Mine the next block.
    ///
    /// Template errors are returned immediately. The returned job resolves
    /// with the solved block, or fails if the worker dies.
    pub fn mine(
        &self,
        reward_address: Option<Address>,
        fee_address: Address,
    ) -> Result<MiningJob, MiningError> {
        let template = self.build_template(reward_address, fee_address)?;
        let difficulty = self.chain.difficulty();

        info!(
            target: "kestrel::miner",
            index = template.index,
            transactions = template.transactions.len(),
            kinds = %kind_summary(&template),
            difficulty,
            "Mining a new block"
        );

        spawn_worker(self.engine.clone(), template, difficulty)
    }
}

/// Transaction counts by kind, e.g. `regular:2,fee:1,stake:1`.
fn kind_summary(template: &BlockTemplate) -> String {
    let mut counts = BTreeMap::<TransactionKind, usize>::new();
    for tx in &template.transactions {
        *counts.entry(tx.kind()).or_default() += 1;
    }
    counts
        .iter()
        .map(|(kind, count)| format!("{kind}:{count}"))
        .collect::<Vec<_>>()
        .join(",")
}
