//! Kestrel primitive types
//!
//! Blocks, block templates and the three transaction shapes the chain knows
//! about:
//! - **regular**: spends prior outputs, created by wallets
//! - **fee**: aggregates per-transaction fees into a single output
//! - **stake**: credits the block producer with the mining reward

pub mod block;
pub mod transaction;

pub use block::{Block, BlockTemplate, SealPreimage};
pub use transaction::{OutPoint, Transaction, TransactionKind, TxInput, TxOutput};

use alloy_primitives::B256;

/// Addresses are 32-byte public keys.
pub type Address = B256;

/// Transaction identifiers are opaque 32-byte random values.
pub type TxId = B256;

/// Current wall-clock time in seconds since the unix epoch.
pub fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

/// Draws a fresh random transaction id.
pub fn random_id() -> TxId {
    B256::from(rand::random::<[u8; 32]>())
}
