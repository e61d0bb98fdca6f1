//! Miner configuration
//!
//! Defaults reproduce the live network parameters. Every value can be
//! overridden from a TOML file:
//!
//! ```toml
//! fee_per_transaction = 1
//! transactions_per_block = 2
//!
//! [[bonus_stages]]
//! threshold = 100
//! multiplier = 0.005
//! ```

use crate::MiningError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fee charged per selected transaction, in the smallest unit
pub const FEE_PER_TRANSACTION: u64 = 1;

/// Flat block reward. Kept for compatibility, the reward path does not use it.
pub const MINING_REWARD: u64 = 5_000_000_000;

/// Maximum number of pool transactions per block
pub const TRANSACTIONS_PER_BLOCK: usize = 2;

/// Reward paid to blocks below [`BOOTSTRAP_HEIGHT`]
pub const BOOTSTRAP_REWARD: u64 = 1_000_000_000;

/// Blocks with an index below this height receive [`BOOTSTRAP_REWARD`]
pub const BOOTSTRAP_HEIGHT: u64 = 2;

/// Bonus stages in declaration order.
///
/// The order matters: the reward calculator keeps overwriting its result for
/// every stage whose threshold lies below the last block index, so the last
/// qualifying entry in this list wins.
pub const DEFAULT_BONUS_STAGES: [BonusStage; 10] = [
    BonusStage::new(10_000, 0.0005),
    BonusStage::new(8_000, 1.0),
    BonusStage::new(6_000, 0.05),
    BonusStage::new(5_000, 0.5),
    BonusStage::new(3_500, 0.05),
    BonusStage::new(3_000, 0.1),
    BonusStage::new(2_000, 0.05),
    BonusStage::new(1_000, 0.01),
    BonusStage::new(100, 0.005),
    BonusStage::new(0, 0.003),
];

/// A reward multiplier that applies once the chain is past `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusStage {
    /// Height the last block index must exceed
    pub threshold: u64,
    /// Fraction of the balance paid as reward
    pub multiplier: f64,
}

impl BonusStage {
    /// Create a new stage
    pub const fn new(threshold: u64, multiplier: f64) -> Self {
        Self { threshold, multiplier }
    }
}

/// Miner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Fee per selected transaction
    pub fee_per_transaction: u64,
    /// Cap on pool transactions per block
    pub transactions_per_block: usize,
    /// Legacy flat reward, unused by the reward calculation
    pub mining_reward: u64,
    /// Reward for blocks below `bootstrap_height`
    pub bootstrap_reward: u64,
    /// Height below which `bootstrap_reward` overrides the computed reward
    pub bootstrap_height: u64,
    /// Bonus stages, evaluated in list order
    pub bonus_stages: Vec<BonusStage>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            fee_per_transaction: FEE_PER_TRANSACTION,
            transactions_per_block: TRANSACTIONS_PER_BLOCK,
            mining_reward: MINING_REWARD,
            bootstrap_reward: BOOTSTRAP_REWARD,
            bootstrap_height: BOOTSTRAP_HEIGHT,
            bonus_stages: DEFAULT_BONUS_STAGES.to_vec(),
        }
    }
}

impl MinerConfig {
    /// Parse a config from TOML. Missing keys fall back to defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, MiningError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MiningError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| MiningError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&contents)
    }

    /// Set the pool transaction cap
    pub fn with_transactions_per_block(mut self, count: usize) -> Self {
        self.transactions_per_block = count;
        self
    }

    /// Replace the bonus stages
    pub fn with_bonus_stages(mut self, stages: Vec<BonusStage>) -> Self {
        self.bonus_stages = stages;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MinerConfig::default();
        assert_eq!(config.fee_per_transaction, 1);
        assert_eq!(config.transactions_per_block, 2);
        assert_eq!(config.mining_reward, 5_000_000_000);
        assert_eq!(config.bootstrap_reward, 1_000_000_000);
        assert_eq!(config.bonus_stages.len(), 10);
        assert_eq!(config.bonus_stages[0], BonusStage::new(10_000, 0.0005));
        assert_eq!(config.bonus_stages[9], BonusStage::new(0, 0.003));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MinerConfig::from_toml_str("transactions_per_block = 5\n").unwrap();
        assert_eq!(config.transactions_per_block, 5);
        assert_eq!(config.fee_per_transaction, FEE_PER_TRANSACTION);
        assert_eq!(config.bonus_stages, DEFAULT_BONUS_STAGES.to_vec());
    }

    #[test]
    fn test_bonus_stages_keep_file_order() {
        let toml = r#"
            [[bonus_stages]]
            threshold = 0
            multiplier = 0.003

            [[bonus_stages]]
            threshold = 100
            multiplier = 0.005
        "#;
        let config = MinerConfig::from_toml_str(toml).unwrap();
        assert_eq!(
            config.bonus_stages,
            vec![BonusStage::new(0, 0.003), BonusStage::new(100, 0.005)]
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fee_per_transaction = 3").unwrap();

        let config = MinerConfig::load(file.path()).unwrap();
        assert_eq!(config.fee_per_transaction, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = MinerConfig::load("/nonexistent/kestrel-miner.toml").unwrap_err();
        assert!(matches!(err, MiningError::ConfigRead { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let err = MinerConfig::from_toml_str("transactions_per_block = \"many\"").unwrap_err();
        assert!(matches!(err, MiningError::Config(_)));
    }
}
