//! Kestrel CPU Miner Binary
//!
//! Mines blocks on an in-memory devnet chain.
//!
//! Usage:
//!   kestrel-mine --blocks 5 --pending 4 --difficulty 1000000000000000

use alloy_primitives::B256;
use clap::Parser;
use kestrel_consensus::{DifficultySchedule, KestrelConsensus, Sha256Hasher};
use kestrel_miner::{InMemoryChain, Miner, MinerConfig, spawn_mining_service};
use kestrel_primitives::{Address, Transaction, TxInput, TxOutput, random_id};
use std::{path::PathBuf, sync::Arc, time::Instant};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Kestrel CPU Miner
#[derive(Debug, Parser)]
#[command(name = "kestrel-mine")]
#[command(about = "CPU miner for the Kestrel proof-of-work chain")]
struct Args {
    /// Number of blocks to mine
    #[arg(long, short = 'n', default_value = "1")]
    blocks: u64,

    /// Address receiving the stake reward; no reward is paid when omitted
    #[arg(long, env = "KESTREL_REWARD_ADDRESS")]
    reward_address: Option<Address>,

    /// Address receiving transaction fees
    #[arg(long, env = "KESTREL_FEE_ADDRESS", default_value_t = B256::with_last_byte(0xfe))]
    fee_address: Address,

    /// Miner configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed difficulty target instead of the height-based schedule
    #[arg(long, short = 'd')]
    difficulty: Option<u64>,

    /// Demo transactions to seed the pending pool with
    #[arg(long, default_value = "0")]
    pending: usize,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => MinerConfig::load(path)?,
        None => MinerConfig::default(),
    };

    let chain = Arc::new(match args.difficulty {
        Some(target) => InMemoryChain::new(KestrelConsensus::with_hasher(
            Arc::new(Sha256Hasher),
            DifficultySchedule::constant(target),
        )),
        None => InMemoryChain::devnet(),
    });

    for transaction in demo_transactions(args.pending, args.fee_address) {
        chain.add_pending_transaction(transaction);
    }

    info!(
        target: "kestrel::mine",
        reward_address = ?args.reward_address,
        fee_address = %args.fee_address,
        blocks = args.blocks,
        pending = args.pending,
        "Starting Kestrel CPU miner"
    );

    let miner = Miner::new(
        Arc::clone(&chain),
        Arc::clone(&chain),
        Arc::new(Sha256Hasher),
        &config,
    );
    let (handle, mut mined_rx) = spawn_mining_service(miner);

    let reporter = tokio::spawn(async move {
        while let Some(mined) = mined_rx.recv().await {
            info!(
                target: "kestrel::mine",
                index = mined.block.index,
                hash = %mined.block.hash,
                nonce = mined.block.nonce,
                transactions = mined.block.transactions.len(),
                duration_ms = mined.elapsed.as_millis(),
                "Block mined"
            );
        }
    });

    let start = Instant::now();
    for _ in 0..args.blocks {
        let block = handle.mine(args.reward_address, args.fee_address).await?;
        chain.add_block(block)?;
    }

    info!(
        target: "kestrel::mine",
        blocks = args.blocks,
        height = chain.height(),
        elapsed_secs = start.elapsed().as_secs_f64(),
        "Mining complete"
    );

    handle.shutdown().await?;
    reporter.await?;
    Ok(())
}

/// Transactions spending fresh outputs, with every third one replaying the
/// input of the transaction before it.
fn demo_transactions(count: usize, recipient: Address) -> Vec<Transaction> {
    let mut transactions: Vec<Transaction> = Vec::with_capacity(count);
    for i in 0..count {
        let input = match transactions.last() {
            Some(previous) if i % 3 == 2 => previous.inputs()[0].clone(),
            _ => TxInput::new(random_id(), 0),
        };
        transactions.push(Transaction::regular(
            random_id(),
            vec![input],
            vec![TxOutput::new(1, recipient)],
        ));
    }
    transactions
}
