//! Proof-of-work puzzle and search.
//!
//! A candidate `p` is valid for `previous_proof` when the hex SHA-256 of the
//! decimal text `"{previous_proof}{p}"` starts with `difficulty` copies of
//! [`POW_DIGIT`]. Every search here returns the smallest valid candidate, so
//! sequential and parallel searches agree.
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::config::SearchStrategy;
use crate::constants::{POW_DIGIT, POW_TARGET_DIFFICULTY};
use crate::hash::hash_hex;

/// Candidates examined between cancellation checks.
const SEARCH_CHUNK: u64 = 1 << 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
    target: String,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(POW_TARGET_DIFFICULTY)
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty,
            target: POW_DIGIT.to_string().repeat(difficulty),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn valid_proof(&self, previous_proof: u64, candidate: u64) -> bool {
        let guess = format!("{previous_proof}{candidate}");
        hash_hex(guess.as_bytes()).starts_with(&self.target)
    }

    /// Linear scan from 0. Unbounded and CPU-bound.
    pub fn find_proof(&self, previous_proof: u64) -> u64 {
        let mut proof = 0;
        while !self.valid_proof(previous_proof, proof) {
            proof += 1;
        }
        proof
    }

    /// Same result as [`find_proof`](Self::find_proof), spread over the rayon pool.
    pub fn find_proof_parallel(&self, previous_proof: u64) -> u64 {
        let mut start = 0;
        loop {
            if let Some(proof) =
                self.first_valid_in(previous_proof, start, SearchStrategy::Parallel)
            {
                return proof;
            }
            start += SEARCH_CHUNK;
        }
    }

    /// Searches chunk by chunk, giving up with `None` once `cancel` fires.
    pub fn find_proof_cancellable(
        &self,
        previous_proof: u64,
        strategy: SearchStrategy,
        cancel: &CancellationToken,
    ) -> Option<u64> {
        let mut start = 0;
        while !cancel.is_cancelled() {
            if let Some(proof) = self.first_valid_in(previous_proof, start, strategy) {
                return Some(proof);
            }
            start += SEARCH_CHUNK;
        }
        None
    }

    fn first_valid_in(
        &self,
        previous_proof: u64,
        start: u64,
        strategy: SearchStrategy,
    ) -> Option<u64> {
        let end = start.saturating_add(SEARCH_CHUNK);
        match strategy {
            SearchStrategy::Sequential => {
                (start..end).find(|candidate| self.valid_proof(previous_proof, *candidate))
            }
            // find_first keeps the leftmost match, not whichever thread wins
            SearchStrategy::Parallel => (start..end)
                .into_par_iter()
                .find_first(|candidate| self.valid_proof(previous_proof, *candidate)),
        }
    }
}
