//! Append-only, hash-chained ledger for supply-chain traceability.
//!
//! Every block is sealed by a proof-of-work search over the previous
//! block's proof and carries the transactions that were pending when it
//! was sealed. The web layer owns a [`Ledger`] and talks to it with plain
//! data: who sent what to whom, for which product.
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod constants;
pub mod encode;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod pool;
pub mod pow;

pub use config::{LedgerConfig, SearchStrategy};
pub use encode::Canonical;
pub use error::{ChainViolation, LedgerError};
pub use hash::{hash_block, hash_hex};
pub use ledger::{validate_chain, Ledger};
pub use pool::TransactionPool;
pub use pow::ProofOfWork;

/// A movement of a product between two supply-chain participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub product_id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Transaction {
    /// Builds a transaction, rejecting amounts that have no stable textual form.
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        product_id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        if !amount.is_finite() {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            product_id: product_id.into(),
            kind: kind.into(),
        })
    }
}

/// A sealed batch of transactions linked to its predecessor by hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// Seconds since the Unix epoch, with sub-second precision.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// The genesis block: index 1, fixed proof, sentinel previous hash, no transactions.
    pub fn genesis() -> Self {
        Self {
            index: 1,
            timestamp: now_timestamp(),
            transactions: Vec::new(),
            proof: constants::GENESIS_PROOF,
            previous_hash: constants::GENESIS_PREVIOUS_HASH.to_string(),
        }
    }

    /// Hex SHA-256 of the canonical encoding.
    pub fn hash(&self) -> String {
        hash_block(self)
    }
}

/// Wall-clock time as fractional seconds since the Unix epoch.
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
