//! Pending transactions awaiting inclusion in a block.
//!
//! Membership only: the pool does not validate, order or evict. An entry
//! leaves the pool exactly when a block that lists it is accepted. Picking
//! a valid subset at block-build time is the miner's job.
//!
//! Not thread-safe: the chain wraps it together with the block tree under
//! one lock.

use std::collections::HashMap;

use crate::types::{Block, Hash256, Transaction};

#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    entries: HashMap<Hash256, Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx` keyed by its txid, replacing any entry with the same id.
    ///
    /// Returns the txid.
    pub fn add(&mut self, tx: Transaction) -> Hash256 {
        let txid = tx.txid();
        self.entries.insert(txid, tx);
        txid
    }

    /// Remove by txid. Absent ids are a no-op.
    pub fn remove(&mut self, txid: &Hash256) -> Option<Transaction> {
        self.entries.remove(txid)
    }

    /// Drop every transaction confirmed by `block`, including its coinbase.
    ///
    /// Returns how many entries were actually removed.
    pub fn remove_confirmed(&mut self, block: &Block) -> usize {
        std::iter::once(&block.coinbase)
            .chain(&block.transactions)
            .filter(|tx| self.entries.remove(&tx.txid()).is_some())
            .count()
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    pub fn get(&self, txid: &Hash256) -> Option<&Transaction> {
        self.entries.get(txid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current contents, in no particular order.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.entries.values().cloned().collect()
    }

    pub fn txids(&self) -> impl Iterator<Item = &Hash256> {
        self.entries.keys()
    }
}
