//! Proof-of-work search and worker dispatch
//!
//! [`ProofOfWorkEngine::prove_work`] is a plain blocking loop with no
//! suspension points. [`spawn_worker`] moves a template onto a dedicated OS
//! thread and hands back a [`MiningJob`] future that resolves exactly once.

use crate::MiningError;
use kestrel_consensus::{BlockHasher, Sha256Hasher, meets_target};
use kestrel_primitives::{Block, BlockTemplate, unix_timestamp};
use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Attempts between progress logs
const PROGRESS_INTERVAL: u64 = 100_000;

/// Nonce search over a block template.
#[derive(Debug)]
pub struct ProofOfWorkEngine<H = Sha256Hasher> {
    hasher: Arc<H>,
}

impl<H> Clone for ProofOfWorkEngine<H> {
    fn clone(&self) -> Self {
        Self { hasher: Arc::clone(&self.hasher) }
    }
}

impl<H: BlockHasher> ProofOfWorkEngine<H> {
    /// Create an engine hashing with `hasher`
    pub fn new(hasher: Arc<H>) -> Self {
        Self { hasher }
    }

    /// Search until the block's difficulty score falls below `target`.
    ///
    /// Every attempt refreshes the timestamp, bumps the nonce and rehashes.
    /// There is no attempt cap.
    pub fn prove_work(&self, template: BlockTemplate, target: u64) -> Block {
        self.prove_work_with_clock(template, target, unix_timestamp)
    }

    /// [`Self::prove_work`] with an injected clock.
    pub fn prove_work_with_clock(
        &self,
        mut template: BlockTemplate,
        target: u64,
        mut clock: impl FnMut() -> f64,
    ) -> Block {
        let start = Instant::now();
        let first_nonce = template.nonce;

        loop {
            template.timestamp = clock();
            template.nonce += 1;
            let hash = self.hasher.hash(&template.preimage());
            let score = self.hasher.difficulty_score(&hash);

            let attempts = template.nonce - first_nonce;
            if meets_target(score, target) {
                let elapsed = start.elapsed();
                info!(
                    target: "kestrel::pow",
                    index = template.index,
                    difficulty = target,
                    %hash,
                    nonce = template.nonce,
                    attempts,
                    elapsed_ms = elapsed.as_millis(),
                    "Block found"
                );
                return template.seal(hash);
            }

            if attempts % PROGRESS_INTERVAL == 0 {
                let elapsed = start.elapsed();
                debug!(
                    target: "kestrel::pow",
                    index = template.index,
                    attempts,
                    hashrate = format!("{:.2} H/s", attempts as f64 / elapsed.as_secs_f64()),
                    "Mining in progress"
                );
            }
        }
    }
}

impl Default for ProofOfWorkEngine {
    fn default() -> Self {
        Self::new(Arc::new(Sha256Hasher))
    }
}

/// A proof-of-work search running on its own thread.
///
/// Resolves with the solved block, or with a worker error if the thread
/// died before producing one.
#[derive(Debug)]
#[must_use = "a mining job does nothing useful unless its result is awaited"]
pub struct MiningJob {
    index: u64,
    rx: oneshot::Receiver<Result<Block, MiningError>>,
}

impl MiningJob {
    /// Index of the block being mined
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Block the current thread until the search finishes.
    ///
    /// Must not be called from within an async runtime; `.await` the job
    /// there instead.
    pub fn wait(self) -> Result<Block, MiningError> {
        self.rx.blocking_recv().unwrap_or(Err(MiningError::WorkerTerminated))
    }
}

impl Future for MiningJob {
    type Output = Result<Block, MiningError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(MiningError::WorkerTerminated)))
    }
}

/// Run `engine` over `template` on a dedicated thread.
///
/// The thread owns the template for the whole search; nothing is shared with
/// the caller until the solved block is sent back.
pub fn spawn_worker<H: BlockHasher>(
    engine: ProofOfWorkEngine<H>,
    template: BlockTemplate,
    target: u64,
) -> Result<MiningJob, MiningError> {
    let index = template.index;
    let (tx, rx) = oneshot::channel();

    std::thread::Builder::new()
        .name(format!("kestrel-pow-{index}"))
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                engine.prove_work(template, target)
            }))
            .map_err(|payload| MiningError::WorkerPanicked {
                reason: panic_reason(payload.as_ref()),
            });

            // The caller may have dropped the job; the result is discarded then.
            let _ = tx.send(outcome);
        })
        .map_err(MiningError::WorkerSpawn)?;

    Ok(MiningJob { index, rx })
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|reason| (*reason).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
