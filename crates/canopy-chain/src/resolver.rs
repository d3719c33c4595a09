//! Branch ledger resolution.
//!
//! Derives the unspent output set valid immediately after any retained
//! node. Both strategies apply blocks root-to-node with
//! [`UtxoPool::apply_block`], so they agree exactly; they differ only in
//! where the walk starts.

use canopy_core::error::ChainError;
use canopy_core::{Block, Hash256, UtxoPool};

use crate::config::LedgerStrategy;
use crate::tree::{BlockNode, BlockTree};

#[derive(Debug, Clone, Copy, Default)]
pub struct BranchLedgerResolver {
    strategy: LedgerStrategy,
}

impl BranchLedgerResolver {
    pub fn new(strategy: LedgerStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> LedgerStrategy {
        self.strategy
    }

    /// Whether freshly accepted nodes should carry a snapshot.
    pub fn caches_snapshots(&self) -> bool {
        self.strategy == LedgerStrategy::Incremental
    }

    /// Ledger after the node identified by `hash`.
    pub fn ledger_at(&self, tree: &BlockTree, hash: &Hash256) -> Result<UtxoPool, ChainError> {
        let node = tree
            .find_by_hash(hash)
            .ok_or(ChainError::NodeNotFound(*hash))?;
        Ok(self.ledger_for(tree, node))
    }

    /// Ledger after `node`, using the configured strategy.
    pub fn ledger_for(&self, tree: &BlockTree, node: &BlockNode) -> UtxoPool {
        match self.strategy {
            LedgerStrategy::Replay => replay(tree, node),
            LedgerStrategy::Incremental => incremental(tree, node),
        }
    }

    /// Seed the root snapshot. Called once when the chain is created.
    pub fn prime_root(&self, tree: &mut BlockTree) {
        if !self.caches_snapshots() {
            return;
        }
        let mut ledger = UtxoPool::new();
        ledger.apply_block(tree.root().block());
        tree.set_root_snapshot(ledger);
    }
}

/// Full replay from the root, ignoring every cached snapshot.
pub fn replay(tree: &BlockTree, node: &BlockNode) -> UtxoPool {
    let path: Vec<&Block> = tree.ancestors(node).map(BlockNode::block).collect();
    apply_path(UtxoPool::new(), &path)
}

/// Start from the nearest cached ancestor (inclusive) and apply only the
/// blocks below it.
pub fn incremental(tree: &BlockTree, node: &BlockNode) -> UtxoPool {
    let mut pending = Vec::new();
    let mut base = None;
    for ancestor in tree.ancestors(node) {
        if let Some(snapshot) = ancestor.snapshot() {
            base = Some(snapshot.clone());
            break;
        }
        pending.push(ancestor.block());
    }
    apply_path(base.unwrap_or_default(), &pending)
}

/// Apply `path`, given node-to-root, in root-to-node order.
fn apply_path(mut ledger: UtxoPool, path: &[&Block]) -> UtxoPool {
    for block in path.iter().rev() {
        ledger.apply_block(block);
    }
    ledger
}
