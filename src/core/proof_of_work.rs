use crate::core::Block;
use crate::error::{LedgerError, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};

pub const DEFAULT_DIFFICULTY: usize = 4;

/// Prefix-zero proof-of-work over the block's full hash
pub struct ProofOfWork;

impl ProofOfWork {
    /// First `difficulty` hex characters are all `'0'`
    pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
        hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    pub fn validate(block: &Block, difficulty: usize) -> Result<bool> {
        Ok(Self::meets_difficulty(&block.hash()?, difficulty))
    }

    /// Search upward from the block's current proof. Returns `None` once
    /// `cancel` is raised; the flag is checked before every hash attempt so
    /// `block.proof` always holds the last fully tried value.
    pub fn mine(block: &mut Block, difficulty: usize, cancel: &AtomicBool) -> Result<Option<u64>> {
        info!(
            "Mining block {} with difficulty {difficulty} from proof {}",
            block.get_index(),
            block.get_proof()
        );
        loop {
            if cancel.load(Ordering::Relaxed) {
                debug!("Mining of block {} cancelled", block.get_index());
                return Ok(None);
            }
            let hash = block.hash()?;
            if Self::meets_difficulty(&hash, difficulty) {
                info!("Found proof {} for block {}: {hash}", block.get_proof(), block.get_index());
                return Ok(Some(block.get_proof()));
            }
            let next = block.get_proof().checked_add(1).ok_or_else(|| {
                LedgerError::InvalidBlock(format!(
                    "Proof space of block {} exhausted",
                    block.get_index()
                ))
            })?;
            block.set_proof(next);
        }
    }
}
