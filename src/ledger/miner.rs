//! Proof-of-Work Miner
//!
//! Searches for a nonce whose block digest starts with `difficulty` hex
//! zeros. The search is bounded by an iteration cap and can be abandoned
//! through a shared cancellation flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{LedgerError, Result};
use crate::ledger::block::{short_digest, Block, CandidateBlock};
use crate::ledger::digest::DIGEST_HEX_LEN;

/// Attempts between two polls of the cancellation flag
const CANCEL_POLL_INTERVAL: u64 = 1024;

pub const DEFAULT_DIFFICULTY: usize = 2;
pub const DEFAULT_MAX_ITERATIONS: u64 = 5_000_000;

/// Shared flag that stops an in-flight mining attempt
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cancels its flag when dropped unless disarmed
#[derive(Debug)]
pub struct CancelOnDrop {
    flag: CancelFlag,
    armed: bool,
}

impl CancelOnDrop {
    pub fn new(flag: CancelFlag) -> Self {
        Self { flag, armed: true }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.flag.cancel();
        }
    }
}

/// Whether `digest` starts with `difficulty` zero characters
pub fn meets_difficulty(digest: &str, difficulty: usize) -> bool {
    digest.len() >= difficulty && digest.bytes().take(difficulty).all(|b| b == b'0')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWorkMiner {
    difficulty: usize,
    max_iterations: u64,
}

impl ProofOfWorkMiner {
    pub fn new(difficulty: usize, max_iterations: u64) -> Result<Self> {
        if difficulty > DIGEST_HEX_LEN {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds digest length {}",
                difficulty, DIGEST_HEX_LEN
            )));
        }
        if max_iterations == 0 {
            return Err(LedgerError::Config(
                "max mining iterations must be positive".to_string(),
            ));
        }
        Ok(Self {
            difficulty,
            max_iterations,
        })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    /// Mine a candidate into a sealed block
    pub fn mine(&self, candidate: CandidateBlock, cancel: &CancelFlag) -> Result<Block> {
        let preimage = candidate.preimage()?;
        let seeded = preimage.seeded_hasher();

        for nonce in 0..self.max_iterations {
            if nonce % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                debug!("Mining of block #{} cancelled at nonce {}", candidate.index, nonce);
                return Err(LedgerError::MiningCancelled);
            }

            let digest = preimage.finish(seeded.clone(), nonce);
            if meets_difficulty(&digest, self.difficulty) {
                debug!(
                    "Mined block #{} with nonce {} ({})",
                    candidate.index,
                    nonce,
                    short_digest(&digest)
                );
                return Ok(candidate.seal(nonce, digest));
            }
        }

        Err(LedgerError::MiningTimeout {
            attempts: self.max_iterations,
            difficulty: self.difficulty,
        })
    }
}

impl Default for ProofOfWorkMiner {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}
