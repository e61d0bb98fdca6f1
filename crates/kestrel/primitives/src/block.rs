//! Block types
//!
//! A [`BlockTemplate`] is a candidate block awaiting proof of work: nonce is
//! zero and it carries no hash. Sealing a template with a hash produces a
//! [`Block`], which is immutable from then on.

use crate::Transaction;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The fields covered by a block hash.
#[derive(Debug, Clone, Copy)]
pub struct SealPreimage<'a> {
    /// Block height
    pub index: u64,
    /// Hash of the parent block
    pub previous_hash: &'a B256,
    /// Seconds since epoch
    pub timestamp: f64,
    /// Proof-of-work nonce
    pub nonce: u64,
    /// Block body
    pub transactions: &'a [Transaction],
}

/// Unmined candidate block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTemplate {
    /// Block height (parent index + 1)
    pub index: u64,
    /// Parent block hash
    pub previous_hash: B256,
    /// Seconds since epoch
    pub timestamp: f64,
    /// Proof-of-work nonce, zero until the search starts
    pub nonce: u64,
    /// Selected transactions followed by fee and reward transactions
    pub transactions: Vec<Transaction>,
}

impl BlockTemplate {
    /// Create a new template with a zero nonce.
    pub fn new(
        index: u64,
        previous_hash: B256,
        timestamp: f64,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self { index, previous_hash, timestamp, nonce: 0, transactions }
    }

    /// The fields to hash at the current nonce and timestamp.
    pub fn preimage(&self) -> SealPreimage<'_> {
        SealPreimage {
            index: self.index,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            nonce: self.nonce,
            transactions: &self.transactions,
        }
    }

    /// Seal the template with a hash computed over its current fields.
    pub fn seal(self, hash: B256) -> Block {
        Block {
            index: self.index,
            previous_hash: self.previous_hash,
            timestamp: self.timestamp,
            nonce: self.nonce,
            hash,
            transactions: self.transactions,
        }
    }
}

/// A sealed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block height
    pub index: u64,
    /// Parent block hash
    pub previous_hash: B256,
    /// Seconds since epoch
    pub timestamp: f64,
    /// Proof-of-work nonce
    pub nonce: u64,
    /// Hash over all other fields
    pub hash: B256,
    /// Block body
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The fields covered by [`Block::hash`].
    pub fn preimage(&self) -> SealPreimage<'_> {
        SealPreimage {
            index: self.index,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            nonce: self.nonce,
            transactions: &self.transactions,
        }
    }

    /// Iterate over every input of every transaction in the block.
    pub fn inputs(&self) -> impl Iterator<Item = &crate::TxInput> {
        self.transactions.iter().flat_map(|tx| tx.inputs())
    }
}
