//! Kestrel CPU Miner
//!
//! This crate assembles the next block from the pending pool and searches for
//! a nonce whose hash scores below the current difficulty target.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      KESTREL MINER                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Block Template                                         │   │
//! │   │  • Double-spend-safe selection from the pending pool    │   │
//! │   │  • Fee transaction, balance-scaled stake reward         │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                              │                                  │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Nonce Search (dedicated thread per job)                │   │
//! │   │  • Fresh timestamp and nonce + 1 every attempt          │   │
//! │   │  • Stops once the difficulty score is below target      │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                              │                                  │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Solved Block                                           │   │
//! │   │  • Returned through the job, or the service channel     │   │
//! │   │  • The caller appends it to the chain                   │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod chain;
pub mod config;
pub mod miner;
pub mod reward;
pub mod selector;
pub mod service;
pub mod template;
pub mod worker;

pub use chain::{BalanceView, ChainView, InMemoryChain};
pub use config::{
    BOOTSTRAP_HEIGHT, BOOTSTRAP_REWARD, BonusStage, DEFAULT_BONUS_STAGES, FEE_PER_TRANSACTION,
    MINING_REWARD, MinerConfig, TRANSACTIONS_PER_BLOCK,
};
pub use miner::Miner;
pub use reward::RewardCalculator;
pub use selector::{Selection, TransactionSelector};
pub use service::{MinedBlock, MiningService, MiningServiceHandle, spawn_mining_service};
pub use template::BlockTemplateBuilder;
pub use worker::{MiningJob, ProofOfWorkEngine, spawn_worker};

use std::path::PathBuf;
use thiserror::Error;

/// Mining errors
#[derive(Debug, Error)]
pub enum MiningError {
    /// The chain has no blocks to build on
    #[error("No last block to build on")]
    NoLastBlock,

    /// The worker thread could not be started
    #[error("Failed to spawn mining worker")]
    WorkerSpawn(#[source] std::io::Error),

    /// The worker panicked during the search
    #[error("Mining worker panicked: {reason}")]
    WorkerPanicked {
        /// Panic message
        reason: String,
    },

    /// The worker went away without reporting a result
    #[error("Mining worker terminated without a result")]
    WorkerTerminated,

    /// Invalid miner configuration
    #[error("Invalid miner configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Miner configuration file could not be read
    #[error("Failed to read miner configuration from {}", path.display())]
    ConfigRead {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The mining service has shut down
    #[error("Mining service closed")]
    ServiceClosed,
}
