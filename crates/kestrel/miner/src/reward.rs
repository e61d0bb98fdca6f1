//! Mining reward calculation
//!
//! The reward is a fraction of the producer's current balance. The fraction
//! comes from the bonus stage table, walked in declaration order: every stage
//! whose threshold lies below the last block index overwrites the result, so
//! the last qualifying stage in the list decides. Right after genesis (last
//! index 1) the full balance is paid.

use crate::{MiningError, config::BonusStage};
use kestrel_primitives::{Address, Block};
use tracing::debug;

/// Balance assumed for addresses with no (or zero) balance.
const FALLBACK_BALANCE: u64 = 1;

/// Balance-proportional reward calculator
#[derive(Debug, Clone, PartialEq)]
pub struct RewardCalculator {
    stages: Vec<BonusStage>,
}

impl RewardCalculator {
    /// Create a calculator over `stages`, kept in the given order.
    pub fn new(stages: Vec<BonusStage>) -> Self {
        Self { stages }
    }

    /// Bonus stages in evaluation order
    pub fn stages(&self) -> &[BonusStage] {
        &self.stages
    }

    /// Reward for `address` given its `balance` and the chain's last block.
    ///
    /// Returns zero when no stage qualifies, which only happens while the
    /// last block is genesis.
    pub fn calculate(
        &self,
        address: Option<&Address>,
        balance: Option<u64>,
        last_block: Option<&Block>,
    ) -> Result<u64, MiningError> {
        let last_index = last_block.ok_or(MiningError::NoLastBlock)?.index;
        let balance = balance.filter(|&balance| balance > 0).unwrap_or(FALLBACK_BALANCE);

        let mut reward = None;
        for stage in self.stages.iter().filter(|stage| stage.threshold < last_index) {
            let multiplier = if last_index == 1 { 1.0 } else { stage.multiplier };
            reward = Some(scale(balance, multiplier));
        }
        let reward = reward.unwrap_or_default();

        debug!(
            target: "kestrel::reward",
            address = ?address,
            balance,
            reward,
            last_index,
            "Calculated reward"
        );
        Ok(reward)
    }
}

impl Default for RewardCalculator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BONUS_STAGES.to_vec())
    }
}

/// `balance * multiplier`, truncated toward zero.
fn scale(balance: u64, multiplier: f64) -> u64 {
    (balance as f64 * multiplier) as u64
}
