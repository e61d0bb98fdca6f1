//! Kestrel proof of work
//!
//! A block hash is SHA-256 over the string concatenation of the block's
//! fields, in this order:
//!
//! ```text
//! index ++ hex(previous_hash) ++ timestamp ++ json(transactions) ++ nonce
//! ```
//!
//! The difficulty score of a hash is its first 14 hex digits read as an
//! integer. A block satisfies a target when `score < target`, so a smaller
//! target is harder to hit.

use alloy_primitives::{B256, hex};
use kestrel_primitives::{Block, SealPreimage};
use sha2::{Digest, Sha256};

use crate::ConsensusError;

/// Number of hash bytes that make up the difficulty score (14 hex digits).
pub const SCORE_BYTES: usize = 7;

/// Largest possible difficulty score.
pub const MAX_SCORE: u64 = (1 << (SCORE_BYTES * 8)) - 1;

/// Hashes blocks and grades the result.
///
/// Implementations must be deterministic: the same preimage always yields
/// the same hash, and the same hash always yields the same score.
pub trait BlockHasher: Send + Sync + 'static {
    /// Hash the sealed fields of a block.
    fn hash(&self, preimage: &SealPreimage<'_>) -> B256;

    /// Difficulty score of a hash. Lower is harder.
    fn difficulty_score(&self, hash: &B256) -> u64;
}

/// The canonical SHA-256 block hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl BlockHasher for Sha256Hasher {
    fn hash(&self, preimage: &SealPreimage<'_>) -> B256 {
        let mut hasher = Sha256::new();
        hasher.update(preimage.index.to_string());
        hasher.update(hex::encode(preimage.previous_hash));
        hasher.update(preimage.timestamp.to_string());
        // Serializing plain data with string keys cannot fail.
        let body = serde_json::to_vec(preimage.transactions).unwrap_or_default();
        hasher.update(&body);
        hasher.update(preimage.nonce.to_string());

        B256::from_slice(&hasher.finalize())
    }

    fn difficulty_score(&self, hash: &B256) -> u64 {
        difficulty_score(hash)
    }
}

/// Read the leading [`SCORE_BYTES`] of a hash as a big-endian integer.
pub fn difficulty_score(hash: &B256) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[8 - SCORE_BYTES..].copy_from_slice(&hash[..SCORE_BYTES]);
    u64::from_be_bytes(bytes)
}

/// Whether `score` satisfies `target`.
pub const fn meets_target(score: u64, target: u64) -> bool {
    score < target
}

/// Verify a sealed block's hash and proof of work against `target`.
pub fn verify_pow<H: BlockHasher + ?Sized>(
    block: &Block,
    hasher: &H,
    target: u64,
) -> Result<(), ConsensusError> {
    let computed = hasher.hash(&block.preimage());
    if computed != block.hash {
        return Err(ConsensusError::HashMismatch { expected: block.hash, computed });
    }

    let score = hasher.difficulty_score(&computed);
    if !meets_target(score, target) {
        return Err(ConsensusError::InsufficientWork { score, target });
    }

    Ok(())
}
