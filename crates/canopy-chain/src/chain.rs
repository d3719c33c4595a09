//! Thread-safe chain facade.
//!
//! [`BlockChain`] owns the block tree and the transaction pool behind one
//! `RwLock`. Block acceptance validates, inserts, prunes and updates the pool
//! under a single write guard, so readers never see a half-applied block.
//! Events are published while the guard is held, so subscribers receive them
//! in decision order.

use std::sync::Arc;

use canopy_core::error::ChainError;
use canopy_core::traits::{AcceptAll, TransactionVerifier};
use canopy_core::{Block, Hash256, RejectReason, Transaction, TransactionPool, UtxoPool};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::config::ChainConfig;
use crate::events::{ChainEvent, EventBus};
use crate::resolver::BranchLedgerResolver;
use crate::tree::BlockTree;
use crate::validator::{BlockAccepted, BlockValidator};

/// Everything a block acceptance mutates.
#[derive(Debug)]
struct ChainState {
    tree: BlockTree,
    pool: TransactionPool,
}

#[derive(Debug)]
pub struct BlockChain {
    state: RwLock<ChainState>,
    validator: BlockValidator,
    resolver: BranchLedgerResolver,
    events: EventBus,
    config: ChainConfig,
}

impl BlockChain {
    /// Chain rooted at `genesis` with default configuration.
    ///
    /// `genesis` is trusted as given.
    pub fn new(genesis: Block) -> Self {
        Self::build(genesis, ChainConfig::default(), Arc::new(AcceptAll))
    }

    /// Chain with a custom configuration. Fails if `config` does not
    /// validate.
    pub fn with_config(genesis: Block, config: ChainConfig) -> Result<Self, ChainError> {
        Self::with_verifier(genesis, config, Arc::new(AcceptAll))
    }

    /// Chain that consults `verifier` for every listed transaction.
    pub fn with_verifier(
        genesis: Block,
        config: ChainConfig,
        verifier: Arc<dyn TransactionVerifier>,
    ) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self::build(genesis, config, verifier))
    }

    fn build(genesis: Block, config: ChainConfig, verifier: Arc<dyn TransactionVerifier>) -> Self {
        let resolver = BranchLedgerResolver::new(config.ledger_strategy);
        let mut tree = BlockTree::new(genesis, config.cutoff_age);
        resolver.prime_root(&mut tree);
        Self {
            state: RwLock::new(ChainState {
                tree,
                pool: TransactionPool::new(),
            }),
            validator: BlockValidator::with_verifier(config.cutoff_age, verifier),
            resolver,
            events: EventBus::new(config.event_capacity),
            config,
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Receive every [`ChainEvent`] emitted from now on, in the order the
    /// chain made its decisions.
    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }

    /// Try to add `block`. True iff it was accepted.
    pub fn add_block(&self, block: Block) -> bool {
        self.process_block(block).is_ok()
    }

    /// Try to add `block`, reporting why it was rejected.
    pub fn process_block(&self, block: Block) -> Result<BlockAccepted, RejectReason> {
        let hash = block.hash();
        let mut guard = self.state.write();
        let ChainState { tree, pool } = &mut *guard;
        let result = self.validator.process(tree, pool, &self.resolver, block);

        // Emitted under the guard to keep events in acceptance order.
        match &result {
            Ok(accepted) => {
                self.events.emit(ChainEvent::BlockAccepted {
                    hash: accepted.hash,
                    height: accepted.height,
                });
                if accepted.pruned.removed > 0 {
                    self.events.emit(ChainEvent::NodesPruned {
                        removed: accepted.pruned.removed,
                        max_height: accepted.max_height,
                    });
                }
            }
            Err(reason) => self.events.emit(ChainEvent::BlockRejected {
                hash,
                reason: reason.clone(),
            }),
        }
        result
    }

    /// Add `tx` to the pending pool unconditionally.
    pub fn add_transaction(&self, tx: Transaction) {
        let mut guard = self.state.write();
        let txid = guard.pool.add(tx);
        self.events.emit(ChainEvent::TransactionAdded { txid });
    }

    /// Tip of the canonical chain.
    pub fn max_height_block(&self) -> Block {
        self.state.read().tree.max_height_node().block().clone()
    }

    pub fn max_height(&self) -> u64 {
        self.state.read().tree.max_height()
    }

    /// Ledger for mining on top of the canonical tip.
    pub fn max_height_utxo_pool(&self) -> UtxoPool {
        let state = self.state.read();
        let tip = state.tree.max_height_node();
        self.resolver.ledger_for(&state.tree, tip)
    }

    /// Pending transactions, in no particular order.
    pub fn transaction_pool(&self) -> Vec<Transaction> {
        self.state.read().pool.snapshot()
    }

    /// Ledger after the retained block `hash`, if any.
    pub fn utxo_pool_at(&self, hash: &Hash256) -> Option<UtxoPool> {
        let state = self.state.read();
        let node = state.tree.find_by_hash(hash)?;
        Some(self.resolver.ledger_for(&state.tree, node))
    }

    pub fn block_at(&self, hash: &Hash256) -> Option<Block> {
        let state = self.state.read();
        state.tree.find_by_hash(hash).map(|node| node.block().clone())
    }

    pub fn height_of(&self, hash: &Hash256) -> Option<u64> {
        self.state.read().tree.find_by_hash(hash).map(|node| node.height())
    }

    pub fn contains_block(&self, hash: &Hash256) -> bool {
        self.state.read().tree.contains(hash)
    }

    /// Number of retained blocks, genesis included.
    pub fn block_count(&self) -> usize {
        self.state.read().tree.len()
    }

    /// Inspect the tree under a read guard.
    pub fn with_tree<R>(&self, f: impl FnOnce(&BlockTree) -> R) -> R {
        f(&self.state.read().tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerStrategy;
    use canopy_core::{OutPoint, TxInput, TxOutput};

    fn coinbase(tag: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput { value: 50, owner: Hash256([1; 32]) }],
            lock_time: tag,
        }
    }

    fn genesis() -> Block {
        Block::new(Hash256::ZERO, 0, 0, coinbase(0), vec![])
    }

    fn child(prev: Hash256, tag: u64, txs: Vec<Transaction>) -> Block {
        Block::new(prev, tag, tag, coinbase(tag), txs)
    }

    fn spend(op: OutPoint) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput { previous_output: op, signature: vec![] }],
            outputs: vec![TxOutput { value: 50, owner: Hash256([2; 32]) }],
            lock_time: 0,
        }
    }

    #[test]
    fn new_chain_tip_is_genesis() {
        let g = genesis();
        let chain = BlockChain::new(g.clone());
        assert_eq!(chain.max_height_block(), g);
        assert_eq!(chain.max_height(), 0);
        assert_eq!(chain.block_count(), 1);
        assert_eq!(chain.max_height_utxo_pool().len(), 1);
        assert!(chain.transaction_pool().is_empty());
    }

    #[test]
    fn add_block_extends_tip() {
        let g = genesis();
        let chain = BlockChain::new(g.clone());
        let b1 = child(g.hash(), 1, vec![]);
        assert!(chain.add_block(b1.clone()));
        assert_eq!(chain.max_height_block(), b1);
        assert_eq!(chain.height_of(&b1.hash()), Some(1));
        assert_eq!(chain.max_height_utxo_pool().len(), 2);
    }

    #[test]
    fn rejected_block_reports_reason() {
        let chain = BlockChain::new(genesis());
        let orphan = child(Hash256([9; 32]), 1, vec![]);
        assert_eq!(
            chain.process_block(orphan.clone()).unwrap_err(),
            RejectReason::UnknownParent { prev_hash: Hash256([9; 32]) }
        );
        assert!(!chain.add_block(orphan));
    }

    #[test]
    fn transaction_pool_round_trip() {
        let g = genesis();
        let chain = BlockChain::new(g.clone());
        let tx = spend(OutPoint::new(g.coinbase.txid(), 0));
        chain.add_transaction(tx.clone());
        assert_eq!(chain.transaction_pool(), vec![tx.clone()]);

        assert!(chain.add_block(child(g.hash(), 1, vec![tx])));
        assert!(chain.transaction_pool().is_empty());
    }

    #[test]
    fn utxo_pool_at_unknown_block_is_none() {
        let chain = BlockChain::new(genesis());
        assert!(chain.utxo_pool_at(&Hash256([9; 32])).is_none());
        assert!(chain.block_at(&Hash256([9; 32])).is_none());
    }

    #[test]
    fn events_follow_decisions() {
        let g = genesis();
        let chain = BlockChain::new(g.clone());
        let mut rx = chain.subscribe();

        let b1 = child(g.hash(), 1, vec![]);
        chain.add_block(b1.clone());
        chain.add_block(b1.clone());

        assert_eq!(
            rx.try_recv().unwrap(),
            ChainEvent::BlockAccepted { hash: b1.hash(), height: 1 }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ChainEvent::BlockRejected {
                hash: b1.hash(),
                reason: RejectReason::DuplicateBlock(b1.hash()),
            }
        );
    }

    #[test]
    fn pruning_emits_event() {
        let g = genesis();
        let chain = BlockChain::with_config(g.clone(), ChainConfig::default().with_cutoff_age(2)).unwrap();
        let fork = child(g.hash(), 100, vec![]);
        assert!(chain.add_block(fork.clone()));
        let mut rx = chain.subscribe();

        let mut tip = g.hash();
        for tag in 1..=4 {
            let block = child(tip, tag, vec![]);
            tip = block.hash();
            assert!(chain.add_block(block));
        }
        assert!(!chain.contains_block(&fork.hash()));
        let pruned = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, ChainEvent::NodesPruned { .. }))
            .count();
        assert_eq!(pruned, 1);
    }

    #[test]
    fn zero_cutoff_age_is_refused() {
        let err = BlockChain::with_config(genesis(), ChainConfig::default().with_cutoff_age(0))
            .unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));

        let zero_capacity = ChainConfig { event_capacity: 0, ..ChainConfig::default() };
        assert!(BlockChain::with_verifier(genesis(), zero_capacity, Arc::new(AcceptAll)).is_err());
    }

    #[test]
    fn cutoff_of_one_still_grows() {
        let g = genesis();
        let chain = BlockChain::with_config(g.clone(), ChainConfig::default().with_cutoff_age(1))
            .unwrap();
        let b1 = child(g.hash(), 1, vec![]);
        assert!(chain.add_block(b1.clone()));
        assert!(chain.add_block(child(b1.hash(), 2, vec![])));
        // A fork off genesis now trails the tip by two.
        assert_eq!(
            chain.process_block(child(g.hash(), 3, vec![])).unwrap_err(),
            RejectReason::StaleFork { parent_height: 0, max_height: 2 }
        );
    }

    #[test]
    fn replay_strategy_agrees_with_incremental() {
        let g = genesis();
        let incremental = BlockChain::new(g.clone());
        let replay = BlockChain::with_config(
            g.clone(),
            ChainConfig::default().with_ledger_strategy(LedgerStrategy::Replay),
        )
        .unwrap();
        let b1 = child(g.hash(), 1, vec![spend(OutPoint::new(g.coinbase.txid(), 0))]);
        let b2 = child(b1.hash(), 2, vec![]);
        for block in [b1, b2] {
            assert!(incremental.add_block(block.clone()));
            assert!(replay.add_block(block));
        }
        assert_eq!(incremental.max_height_utxo_pool(), replay.max_height_utxo_pool());
        replay.with_tree(|tree| assert!(tree.iter().all(|n| n.snapshot().is_none())));
    }
}
