use crate::Transaction;

/// Transactions accepted since the last block was sealed, in submission order.
#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    pending: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `tx` and returns its 1-based position among the pending
    /// transactions, which is where it lands in the next sealed block.
    pub fn add(&mut self, tx: Transaction) -> usize {
        self.pending.push(tx);
        self.pending.len()
    }

    /// Empties the pool, returning everything queued since the last drain.
    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.pending)
    }

    /// Takes back the most recently queued transaction.
    pub fn pop_last(&mut self) -> Option<Transaction> {
        self.pending.pop()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
