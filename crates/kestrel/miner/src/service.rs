//! Background mining service
//!
//! Wraps a [`Miner`] in a task that handles one mining request at a time.
//! Requests queue up behind the active search; every solved block is
//! published on the mined-block channel in addition to being returned to the
//! requester.
//!
//! Publishing waits for room on the mined-block channel, so its receiver must
//! either be drained or dropped. A dropped receiver only disables publishing.

use crate::{BalanceView, ChainView, Miner, MiningError};
use kestrel_consensus::{BlockHasher, Sha256Hasher};
use kestrel_primitives::{Address, Block};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Capacity of the request and mined-block channels
const CHANNEL_CAPACITY: usize = 16;

/// A block solved by the service
#[derive(Debug, Clone)]
pub struct MinedBlock {
    /// The solved block
    pub block: Block,
    /// Address the stake reward was paid to, if any
    pub reward_address: Option<Address>,
    /// Time from request start to solution, template building included
    pub elapsed: Duration,
}

/// Messages sent to the mining service
#[derive(Debug)]
enum ServiceMessage {
    /// Mine the next block
    Mine {
        reward_address: Option<Address>,
        fee_address: Address,
        reply: Option<oneshot::Sender<Result<Block, MiningError>>>,
    },
    /// Stop after the current request
    Shutdown,
}

/// Handle to control the mining service
#[derive(Debug, Clone)]
pub struct MiningServiceHandle {
    tx: mpsc::Sender<ServiceMessage>,
    running: Arc<AtomicBool>,
}

impl MiningServiceHandle {
    /// Check if a search is currently in flight
    pub fn is_mining(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Mine the next block and wait for it.
    ///
    /// The request runs after every request queued before it.
    pub async fn mine(
        &self,
        reward_address: Option<Address>,
        fee_address: Address,
    ) -> Result<Block, MiningError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServiceMessage::Mine {
            reward_address,
            fee_address,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| MiningError::ServiceClosed)?
    }

    /// Queue a mining request without waiting for it.
    ///
    /// The block is only delivered on the mined-block channel; failures are
    /// logged by the service.
    pub async fn submit(
        &self,
        reward_address: Option<Address>,
        fee_address: Address,
    ) -> Result<(), MiningError> {
        self.send(ServiceMessage::Mine {
            reward_address,
            fee_address,
            reply: None,
        })
        .await
    }

    /// Shut the service down once the current request finishes
    pub async fn shutdown(&self) -> Result<(), MiningError> {
        self.send(ServiceMessage::Shutdown).await
    }

    async fn send(&self, message: ServiceMessage) -> Result<(), MiningError> {
        self.tx.send(message).await.map_err(|_| MiningError::ServiceClosed)
    }
}

/// Sequential mining service
#[derive(Debug)]
pub struct MiningService<C, B, H = Sha256Hasher> {
    miner: Miner<C, B, H>,
    rx: mpsc::Receiver<ServiceMessage>,
    mined_tx: mpsc::Sender<MinedBlock>,
    running: Arc<AtomicBool>,
}

impl<C, B, H> MiningService<C, B, H>
where
    C: ChainView + 'static,
    B: BalanceView + 'static,
    H: BlockHasher,
{
    /// Create a new service, its handle and the mined-block receiver
    pub fn new(miner: Miner<C, B, H>) -> (Self, MiningServiceHandle, mpsc::Receiver<MinedBlock>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (mined_tx, mined_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(false));

        let service = Self {
            miner,
            rx,
            mined_tx,
            running: Arc::clone(&running),
        };
        let handle = MiningServiceHandle { tx, running };

        (service, handle, mined_rx)
    }

    /// Run the service loop until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!(target: "kestrel::service", "Mining service started");

        while let Some(message) = self.rx.recv().await {
            match message {
                ServiceMessage::Mine { reward_address, fee_address, reply } => {
                    self.running.store(true, Ordering::SeqCst);
                    let start = Instant::now();

                    let outcome = match self.miner.mine(reward_address, fee_address) {
                        Ok(job) => job.await,
                        Err(err) => Err(err),
                    };
                    self.running.store(false, Ordering::SeqCst);

                    match &outcome {
                        Ok(block) => {
                            let mined = MinedBlock {
                                block: block.clone(),
                                reward_address,
                                elapsed: start.elapsed(),
                            };
                            self.publish(mined).await;
                        }
                        Err(err) => {
                            warn!(target: "kestrel::service", error = %err, "Mining failed")
                        }
                    }

                    if let Some(reply) = reply {
                        // The requester may have stopped waiting.
                        let _ = reply.send(outcome);
                    }
                }
                ServiceMessage::Shutdown => {
                    info!(target: "kestrel::service", "Shutting down mining service");
                    break;
                }
            }
        }
    }

    /// Hand a solved block to the mined-block receiver, waiting for room.
    async fn publish(&self, mined: MinedBlock) {
        let index = mined.block.index;
        if let Err(err) = self.mined_tx.send(mined).await {
            debug!(
                target: "kestrel::service",
                index,
                error = %err,
                "Mined-block receiver closed"
            );
        }
    }
}

/// Spawn the mining service as a background task
pub fn spawn_mining_service<C, B, H>(
    miner: Miner<C, B, H>,
) -> (MiningServiceHandle, mpsc::Receiver<MinedBlock>)
where
    C: ChainView + 'static,
    B: BalanceView + 'static,
    H: BlockHasher,
{
    let (service, handle, mined_rx) = MiningService::new(miner);

    tokio::spawn(async move {
        service.run().await;
    });

    (handle, mined_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryChain, MinerConfig};
    use alloy_primitives::B256;
    use assert_matches::assert_matches;
    use kestrel_consensus::{DifficultySchedule, KestrelConsensus};

    const FEE_ADDRESS: Address = B256::repeat_byte(0xfe);
    const REWARD_ADDRESS: Address = B256::repeat_byte(0x5e);

    fn easy_miner() -> (Arc<InMemoryChain>, Miner<InMemoryChain, InMemoryChain>) {
        let chain = Arc::new(InMemoryChain::new(KestrelConsensus::with_hasher(
            Arc::new(Sha256Hasher),
            DifficultySchedule::constant(u64::MAX),
        )));
        let miner = Miner::new(
            Arc::clone(&chain),
            Arc::clone(&chain),
            Arc::new(Sha256Hasher),
            &MinerConfig::default(),
        );
        (chain, miner)
    }

    #[tokio::test]
    async fn test_mine_returns_and_publishes_block() {
        let (_chain, miner) = easy_miner();
        let (handle, mut mined_rx) = spawn_mining_service(miner);

        let block = handle.mine(Some(REWARD_ADDRESS), FEE_ADDRESS).await.unwrap();
        assert_eq!(block.index, 1);

        let mined = tokio::time::timeout(Duration::from_secs(10), mined_rx.recv())
            .await
            .expect("mined block should be published")
            .expect("service should still be running");
        assert_eq!(mined.block, block);
        assert_eq!(mined.reward_address, Some(REWARD_ADDRESS));
        assert!(!handle.is_mining());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_requests_run_in_order() {
        let (chain, miner) = easy_miner();
        let (handle, mut mined_rx) = spawn_mining_service(miner);

        handle.submit(Some(REWARD_ADDRESS), FEE_ADDRESS).await.unwrap();
        let first = mined_rx.recv().await.unwrap();
        chain.add_block(first.block).unwrap();

        let second = handle.mine(Some(REWARD_ADDRESS), FEE_ADDRESS).await.unwrap();
        assert_eq!(second.index, 2);
        chain.add_block(second).unwrap();
        assert_eq!(chain.height(), 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_channel_delivers_every_block() {
        let (_chain, miner) = easy_miner();
        let (handle, mut mined_rx) = spawn_mining_service(miner);
        let requests = CHANNEL_CAPACITY + 5;

        let submitter = handle.clone();
        let submitted = tokio::spawn(async move {
            for _ in 0..requests {
                submitter.submit(Some(REWARD_ADDRESS), FEE_ADDRESS).await.unwrap();
            }
            submitter.mine(Some(REWARD_ADDRESS), FEE_ADDRESS).await.unwrap()
        });

        // Let the service fill the channel before anything is drained.
        while mined_rx.len() < CHANNEL_CAPACITY {
            tokio::task::yield_now().await;
        }

        let mut received = Vec::new();
        for _ in 0..=requests {
            let mined = tokio::time::timeout(Duration::from_secs(10), mined_rx.recv())
                .await
                .expect("every solved block should be published")
                .expect("service should still be running");
            received.push(mined.block);
        }
        let last = submitted.await.unwrap();

        assert_eq!(received.len(), requests + 1);
        assert_eq!(received.last(), Some(&last));
        assert!(received.iter().all(|block| block.index == 1));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_stall_service() {
        let (_chain, miner) = easy_miner();
        let (handle, mined_rx) = spawn_mining_service(miner);
        drop(mined_rx);

        for _ in 0..=CHANNEL_CAPACITY {
            let block = handle.mine(Some(REWARD_ADDRESS), FEE_ADDRESS).await.unwrap();
            assert_eq!(block.index, 1);
        }

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_service_rejects_requests() {
        let (_chain, miner) = easy_miner();
        let (handle, _mined_rx) = spawn_mining_service(miner);

        handle.shutdown().await.unwrap();
        // Wait for the loop to drop its receiver.
        while !handle.tx.is_closed() {
            tokio::task::yield_now().await;
        }

        assert_matches!(
            handle.mine(Some(REWARD_ADDRESS), FEE_ADDRESS).await,
            Err(MiningError::ServiceClosed)
        );
    }
}
