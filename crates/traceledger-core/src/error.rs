use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount {0} is not a finite number")]
    InvalidAmount(f64),
    #[error("proof search cancelled before the block was sealed")]
    SealCancelled,
    #[error("no block with index {0}")]
    UnknownBlock(u64),
    #[error("no block with hash {0}")]
    UnknownBlockHash(String),
    #[error("invalid ledger configuration: {0}")]
    InvalidConfig(String),
}

/// The first broken link found while walking a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("block {index}: previous_hash {found} does not match predecessor hash {expected}")]
    HashMismatch {
        index: u64,
        expected: String,
        found: String,
    },
    #[error("block {index}: proof {proof} is not valid against previous proof {previous_proof}")]
    InvalidProof {
        index: u64,
        previous_proof: u64,
        proof: u64,
    },
    #[error("block at position {position} carries index {index}")]
    IndexMismatch { position: u64, index: u64 },
}
