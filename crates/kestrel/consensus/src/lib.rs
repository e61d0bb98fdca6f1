//! Kestrel Consensus Implementation
//!
//! This crate provides the consensus rules the miner has to respect:
//! - Block hashing and difficulty scoring
//! - Height-based difficulty schedule
//! - Genesis block and parent linkage checks

pub mod difficulty;
pub mod pow;

pub use difficulty::DifficultySchedule;
pub use pow::{BlockHasher, Sha256Hasher, difficulty_score, meets_target, verify_pow};

use alloy_primitives::B256;
use kestrel_primitives::{Block, BlockTemplate};
use std::sync::Arc;

/// Genesis block timestamp (seconds since epoch)
pub const GENESIS_TIMESTAMP: f64 = 1_465_154_705.0;

/// Build the genesis block: height zero, zero parent, no transactions.
pub fn genesis_block<H: BlockHasher + ?Sized>(hasher: &H) -> Block {
    let template = BlockTemplate::new(0, B256::ZERO, GENESIS_TIMESTAMP, Vec::new());
    let hash = hasher.hash(&template.preimage());
    template.seal(hash)
}

/// Kestrel consensus checks
#[derive(Debug, Clone)]
pub struct KestrelConsensus<H = Sha256Hasher> {
    /// Block hasher
    hasher: Arc<H>,
    /// Difficulty schedule
    schedule: DifficultySchedule,
}

impl KestrelConsensus {
    /// Create consensus with the canonical hasher and default schedule
    pub fn new() -> Self {
        Self::with_hasher(Arc::new(Sha256Hasher), DifficultySchedule::new())
    }
}

impl<H: BlockHasher> KestrelConsensus<H> {
    /// Create consensus with a custom hasher and schedule
    pub fn with_hasher(hasher: Arc<H>, schedule: DifficultySchedule) -> Self {
        Self { hasher, schedule }
    }

    /// The block hasher
    pub const fn hasher(&self) -> &Arc<H> {
        &self.hasher
    }

    /// The difficulty schedule
    pub const fn schedule(&self) -> &DifficultySchedule {
        &self.schedule
    }

    /// Target for the block at `index`
    pub fn difficulty_at(&self, index: u64) -> u64 {
        self.schedule.difficulty_at(index)
    }

    /// Check that `block` extends `parent` and carries valid proof of work
    /// against `target`.
    pub fn validate_block(
        &self,
        block: &Block,
        parent: &Block,
        target: u64,
    ) -> Result<(), ConsensusError> {
        let expected = parent.index + 1;
        if block.index != expected {
            return Err(ConsensusError::IndexMismatch { expected, actual: block.index });
        }
        if block.previous_hash != parent.hash {
            return Err(ConsensusError::PreviousHashMismatch {
                expected: parent.hash,
                actual: block.previous_hash,
            });
        }
        verify_pow(block, self.hasher.as_ref(), target)
    }
}

impl Default for KestrelConsensus {
    fn default() -> Self {
        Self::new()
    }
}

/// Kestrel consensus errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    /// Stored hash does not match the block fields
    #[error("block hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        /// Hash carried by the block
        expected: B256,
        /// Hash recomputed from the block fields
        computed: B256,
    },
    /// Hash score does not fall below the target
    #[error("insufficient proof of work: score {score} >= target {target}")]
    InsufficientWork {
        /// Difficulty score of the block hash
        score: u64,
        /// Target the score had to undercut
        target: u64,
    },
    /// Block index does not follow its parent
    #[error("block index mismatch: expected {expected}, got {actual}")]
    IndexMismatch {
        /// Parent index + 1
        expected: u64,
        /// Index carried by the block
        actual: u64,
    },
    /// Block does not point at its parent
    #[error("previous hash mismatch: expected {expected}, got {actual}")]
    PreviousHashMismatch {
        /// Parent hash
        expected: B256,
        /// Previous hash carried by the block
        actual: B256,
    },
}
