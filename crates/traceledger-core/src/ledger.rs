use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{LedgerConfig, SearchStrategy};
use crate::error::{ChainViolation, LedgerError};
use crate::hash::hash_block;
use crate::pool::TransactionPool;
use crate::pow::ProofOfWork;
use crate::{now_timestamp, Block, Transaction};

/// Owns the chain and the pending pool. The chain always holds at least
/// the genesis block and only ever grows through [`Ledger::seal_block`].
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    pool: TransactionPool,
    pow: ProofOfWork,
    search: SearchStrategy,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// A ledger holding only the genesis block, using the reference puzzle.
    pub fn new() -> Self {
        Self::from_parts(ProofOfWork::default(), SearchStrategy::default())
    }

    pub fn with_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self::from_parts(
            ProofOfWork::new(config.difficulty),
            config.search,
        ))
    }

    fn from_parts(pow: ProofOfWork, search: SearchStrategy) -> Self {
        Self {
            chain: vec![Block::genesis()],
            pool: TransactionPool::new(),
            pow,
            search,
        }
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Queues a transaction for the next block and returns that block's index.
    pub fn submit_transaction(
        &mut self,
        sender: &str,
        receiver: &str,
        amount: f64,
        product_id: &str,
        kind: &str,
    ) -> Result<u64, LedgerError> {
        let tx = Transaction::new(sender, receiver, amount, product_id, kind)?;
        let position = self.pool.add(tx);
        let next_index = self.last_block().index + 1;
        debug!(
            sender,
            receiver,
            amount,
            product_id,
            kind,
            position,
            next_index,
            "transaction queued"
        );
        Ok(next_index)
    }

    pub fn last_block(&self) -> &Block {
        // the genesis block is pushed at construction and nothing pops
        &self.chain[self.chain.len() - 1]
    }

    /// Seals the pending pool into a new block and appends it.
    ///
    /// The proof search runs before the pool is touched; the drain and the
    /// append happen together once the block is assembled.
    pub fn seal_block(&mut self) -> Block {
        let started = Instant::now();
        let previous_hash = hash_block(self.last_block());
        let previous_proof = self.last_block().proof;
        let proof = match self.search {
            SearchStrategy::Sequential => self.pow.find_proof(previous_proof),
            SearchStrategy::Parallel => self.pow.find_proof_parallel(previous_proof),
        };
        self.commit(previous_hash, proof, started)
    }

    /// Like [`seal_block`](Self::seal_block), but abandons the proof search
    /// when `cancel` fires. A cancelled seal leaves the pool and chain untouched.
    pub fn seal_block_cancellable(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Block, LedgerError> {
        let started = Instant::now();
        let previous_hash = hash_block(self.last_block());
        let previous_proof = self.last_block().proof;
        match self
            .pow
            .find_proof_cancellable(previous_proof, self.search, cancel)
        {
            Some(proof) => Ok(self.commit(previous_hash, proof, started)),
            None => {
                warn!(
                    pending = self.pool.len(),
                    "proof search cancelled, block not sealed"
                );
                Err(LedgerError::SealCancelled)
            }
        }
    }

    fn commit(&mut self, previous_hash: String, proof: u64, started: Instant) -> Block {
        let floor = self.last_block().timestamp;
        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: now_timestamp().max(floor),
            transactions: self.pool.drain(),
            proof,
            previous_hash,
        };
        self.chain.push(block.clone());
        info!(
            index = block.index,
            proof,
            txs = block.transactions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "block sealed"
        );
        block
    }

    pub fn is_chain_valid(&self) -> bool {
        self.verify_chain().is_ok()
    }

    /// Names the first broken link, if any. The genesis block is trusted.
    pub fn verify_chain(&self) -> Result<(), ChainViolation> {
        validate_chain(&self.chain, &self.pow).inspect_err(|violation| {
            warn!(%violation, "chain validation failed");
        })
    }

    pub fn export(&self) -> &[Block] {
        &self.chain
    }

    pub fn length(&self) -> usize {
        self.chain.len()
    }

    /// Looks up a block by its 1-based index.
    pub fn block(&self, index: u64) -> Option<&Block> {
        let position = usize::try_from(index.checked_sub(1)?).ok()?;
        self.chain.get(position)
    }

    pub fn block_hash(&self, index: u64) -> Result<String, LedgerError> {
        self.block(index)
            .map(hash_block)
            .ok_or(LedgerError::UnknownBlock(index))
    }

    /// Finds the block whose hash is `hash`, i.e. the value handed back to
    /// callers when their transaction was sealed.
    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|block| hash_block(block) == hash)
    }

    /// Every sealed transaction for `product_id`, in chain order, paired
    /// with the index of the block that holds it.
    pub fn product_history(&self, product_id: &str) -> Vec<(u64, &Transaction)> {
        self.chain
            .iter()
            .flat_map(|block| {
                block
                    .transactions
                    .iter()
                    .map(move |tx| (block.index, tx))
            })
            .filter(|(_, tx)| tx.product_id == product_id)
            .collect()
    }

    pub fn pending(&self) -> &[Transaction] {
        self.pool.pending()
    }

    /// Drops the most recently queued transaction, for callers whose seal
    /// was abandoned after they submitted.
    pub fn withdraw_last_pending(&mut self) -> Option<Transaction> {
        let tx = self.pool.pop_last();
        if let Some(tx) = &tx {
            debug!(
                sender = %tx.sender,
                product_id = %tx.product_id,
                "pending transaction withdrawn"
            );
        }
        tx
    }
}

/// Walks `blocks` from the second entry on, checking index continuity, hash
/// linkage and proof validity for every adjacent pair. The first block is
/// taken as given; an empty or single-block chain is valid.
pub fn validate_chain(blocks: &[Block], pow: &ProofOfWork) -> Result<(), ChainViolation> {
    for (offset, pair) in blocks.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);
        let position = offset as u64 + 2;
        if block.index != position {
            return Err(ChainViolation::IndexMismatch {
                position,
                index: block.index,
            });
        }
        let expected = hash_block(previous);
        if block.previous_hash != expected {
            return Err(ChainViolation::HashMismatch {
                index: block.index,
                expected,
                found: block.previous_hash.clone(),
            });
        }
        if !pow.valid_proof(previous.proof, block.proof) {
            return Err(ChainViolation::InvalidProof {
                index: block.index,
                previous_proof: previous.proof,
                proof: block.proof,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};

    fn fast_ledger() -> Ledger {
        Ledger::with_config(&LedgerConfig {
            difficulty: 2,
            ..LedgerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn genesis_invariant() {
        let ledger = Ledger::new();
        assert_eq!(ledger.length(), 1);
        let genesis = ledger.last_block();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(ledger.pending().is_empty());
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn submit_returns_next_block_index() {
        let mut ledger = fast_ledger();
        assert_eq!(ledger.submit_transaction("A", "B", 1.0, "p", "t").unwrap(), 2);
        assert_eq!(ledger.submit_transaction("A", "B", 1.0, "p", "t").unwrap(), 2);
        ledger.seal_block();
        assert_eq!(ledger.submit_transaction("A", "B", 1.0, "p", "t").unwrap(), 3);
    }

    #[test]
    fn malformed_amount_is_not_applied() {
        let mut ledger = fast_ledger();
        let err = ledger
            .submit_transaction("A", "B", f64::NAN, "p", "t")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn end_to_end_seal() {
        let mut ledger = Ledger::new();
        ledger.submit_transaction("A", "B", 10.0, "prod-1", "transfer").unwrap();
        ledger.submit_transaction("B", "C", 5.0, "prod-1", "transfer").unwrap();
        let genesis = ledger.last_block().clone();

        let block = ledger.seal_block();
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].sender, "A");
        assert_eq!(block.transactions[1].sender, "B");
        assert_eq!(block.previous_hash, hash_block(&genesis));
        assert_eq!(block.proof, 35293);
        assert!(ledger.proof_of_work().valid_proof(genesis.proof, block.proof));
        assert_eq!(ledger.length(), 2);
        assert!(ledger.pending().is_empty());
        assert!(ledger.is_chain_valid());
        assert_eq!(ledger.last_block(), &block);
    }

    #[test]
    fn empty_pool_sealing() {
        let mut ledger = fast_ledger();
        let first = ledger.seal_block();
        let second = ledger.seal_block();
        assert!(first.transactions.is_empty());
        assert!(second.transactions.is_empty());
        assert_eq!(second.previous_hash, hash_block(&first));
        assert_eq!(ledger.length(), 3);
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn timestamps_do_not_go_backwards() {
        let mut ledger = fast_ledger();
        for _ in 0..3 {
            ledger.seal_block();
        }
        let blocks = ledger.export();
        assert!(blocks.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn tampered_previous_hash_is_detected() {
        let mut ledger = fast_ledger();
        ledger.seal_block();
        ledger.seal_block();
        ledger.chain[1].previous_hash = "f".repeat(64);
        assert!(!ledger.is_chain_valid());
        assert!(matches!(
            ledger.verify_chain(),
            Err(ChainViolation::HashMismatch { index: 2, .. })
        ));
    }

    #[test]
    fn tampered_proof_is_detected() {
        let mut ledger = fast_ledger();
        ledger.seal_block();
        let last = ledger.chain.len() - 1;
        ledger.chain[last].proof += 1;
        assert!(matches!(
            ledger.verify_chain(),
            Err(ChainViolation::InvalidProof { index: 2, .. })
        ));
    }

    #[test]
    fn tampered_transaction_breaks_the_next_link() {
        let mut ledger = fast_ledger();
        ledger.submit_transaction("A", "B", 10.0, "p", "t").unwrap();
        ledger.seal_block();
        ledger.seal_block();
        ledger.chain[1].transactions[0].amount = 1000.0;
        assert!(matches!(
            ledger.verify_chain(),
            Err(ChainViolation::HashMismatch { index: 3, .. })
        ));
    }

    #[test]
    fn genesis_fields_are_trusted() {
        let mut ledger = fast_ledger();
        ledger.chain[0].previous_hash = "not-the-sentinel".to_string();
        assert!(ledger.is_chain_valid());
    }

    #[test]
    fn index_gap_is_detected() {
        let mut ledger = fast_ledger();
        ledger.seal_block();
        ledger.chain[1].index = 7;
        assert_eq!(
            ledger.verify_chain(),
            Err(ChainViolation::IndexMismatch {
                position: 2,
                index: 7
            })
        );
    }

    #[test]
    fn block_lookup_is_one_based() {
        let mut ledger = fast_ledger();
        let sealed = ledger.seal_block();
        assert!(ledger.block(0).is_none());
        assert_eq!(ledger.block(1).map(|b| b.index), Some(1));
        assert_eq!(ledger.block(2), Some(&sealed));
        assert!(ledger.block(3).is_none());
        assert_eq!(ledger.block_hash(2).unwrap(), hash_block(&sealed));
        assert!(matches!(
            ledger.block_hash(9),
            Err(LedgerError::UnknownBlock(9))
        ));
    }

    #[test]
    fn cancelled_seal_keeps_pool_and_chain() {
        let mut ledger = Ledger::with_config(&LedgerConfig {
            difficulty: 64,
            ..LedgerConfig::default()
        })
        .unwrap();
        ledger.submit_transaction("A", "B", 1.0, "p", "t").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            ledger.seal_block_cancellable(&token),
            Err(LedgerError::SealCancelled)
        ));
        assert_eq!(ledger.length(), 1);
        assert_eq!(ledger.pending().len(), 1);
    }

    #[test]
    fn cancellable_seal_without_cancellation_matches_seal() {
        let mut a = fast_ledger();
        let mut b = fast_ledger();
        let token = CancellationToken::new();
        let sealed = b.seal_block_cancellable(&token).unwrap();
        assert_eq!(a.seal_block().proof, sealed.proof);
    }

    #[test]
    fn parallel_search_builds_the_same_proofs() {
        let mut parallel = Ledger::with_config(&LedgerConfig {
            difficulty: 4,
            search: SearchStrategy::Parallel,
        })
        .unwrap();
        assert_eq!(parallel.seal_block().proof, 35293);
        assert_eq!(parallel.seal_block().proof, 35089);
        assert!(parallel.is_chain_valid());
    }

    #[test]
    fn block_by_hash_resolves_sealed_blocks() {
        let mut ledger = fast_ledger();
        ledger.submit_transaction("A", "B", 3.0, "p", "t").unwrap();
        let sealed = ledger.seal_block();
        let hash = hash_block(&sealed);
        assert_eq!(ledger.block_by_hash(&hash), Some(&sealed));
        let genesis_hash = ledger.block_hash(1).unwrap();
        assert_eq!(ledger.block_by_hash(&genesis_hash).map(|b| b.index), Some(1));
        assert!(ledger.block_by_hash(&"0".repeat(64)).is_none());
        assert!(ledger.block_by_hash("").is_none());
    }

    #[test]
    fn product_history_spans_blocks_in_order() {
        let mut ledger = fast_ledger();
        ledger.submit_transaction("farm", "mill", 10.0, "wheat", "harvest").unwrap();
        ledger.submit_transaction("farm", "mill", 4.0, "barley", "harvest").unwrap();
        ledger.seal_block();
        ledger.seal_block();
        ledger.submit_transaction("mill", "bakery", 8.0, "wheat", "transfer").unwrap();
        ledger.seal_block();
        ledger.submit_transaction("bakery", "shop", 2.0, "wheat", "sale").unwrap();

        let history = ledger.product_history("wheat");
        let seen: Vec<(u64, &str)> = history
            .iter()
            .map(|(index, tx)| (*index, tx.receiver.as_str()))
            .collect();
        // the pending sale is not on the chain yet
        assert_eq!(seen, [(2, "mill"), (4, "bakery")]);
        assert_eq!(ledger.product_history("barley").len(), 1);
        assert!(ledger.product_history("rye").is_empty());
    }

    #[test]
    fn withdraw_last_pending_undoes_a_submit() {
        let mut ledger = fast_ledger();
        ledger.submit_transaction("A", "B", 1.0, "p", "t").unwrap();
        ledger.submit_transaction("C", "D", 2.0, "p", "t").unwrap();
        let withdrawn = ledger.withdraw_last_pending().unwrap();
        assert_eq!(withdrawn.sender, "C");
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(ledger.length(), 1);
    }

    #[test]
    fn validate_chain_edge_cases() {
        let pow = ProofOfWork::default();
        assert!(validate_chain(&[], &pow).is_ok());
        assert!(validate_chain(&[Block::genesis()], &pow).is_ok());
    }
}
