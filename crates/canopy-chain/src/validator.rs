//! Block acceptance.
//!
//! A candidate block moves through
//! `Received → ParentResolved → LedgerDerived → InputsChecked → CutoffChecked`
//! and is then either accepted or rejected. Every check runs before any
//! mutation, so a rejection leaves the tree and the pool exactly as they
//! were.

use std::fmt;
use std::sync::Arc;

use canopy_core::traits::{AcceptAll, TransactionVerifier};
use canopy_core::{Block, Hash256, RejectReason, TransactionPool, UtxoPool};
use tracing::trace;

use crate::resolver::BranchLedgerResolver;
use crate::tree::{BlockTree, PruneStats};

/// A block that passed every check, with the ledger valid after it.
#[derive(Debug, Clone)]
pub struct ValidatedBlock {
    pub block: Block,
    pub hash: Hash256,
    pub parent: Hash256,
    pub height: u64,
    pub ledger: UtxoPool,
}

/// Summary of an accepted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAccepted {
    pub hash: Hash256,
    pub height: u64,
    /// Best height after insertion.
    pub max_height: u64,
    /// Pool entries confirmed by this block.
    pub confirmed: usize,
    pub pruned: PruneStats,
}

pub struct BlockValidator {
    cutoff_age: u64,
    verifier: Arc<dyn TransactionVerifier>,
}

impl fmt::Debug for BlockValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockValidator")
            .field("cutoff_age", &self.cutoff_age)
            .finish_non_exhaustive()
    }
}

impl BlockValidator {
    /// Validator that enforces input presence only.
    pub fn new(cutoff_age: u64) -> Self {
        Self::with_verifier(cutoff_age, Arc::new(AcceptAll))
    }

    pub fn with_verifier(cutoff_age: u64, verifier: Arc<dyn TransactionVerifier>) -> Self {
        Self { cutoff_age, verifier }
    }

    pub fn cutoff_age(&self) -> u64 {
        self.cutoff_age
    }

    /// Run every check against the current tree without touching it.
    pub fn validate(
        &self,
        tree: &BlockTree,
        resolver: &BranchLedgerResolver,
        block: Block,
    ) -> Result<ValidatedBlock, RejectReason> {
        // Received
        let hash = block.hash();
        if tree.contains(&hash) {
            return Err(RejectReason::DuplicateBlock(hash));
        }

        // ParentResolved
        let prev_hash = block.prev_hash();
        let parent = tree
            .find_by_hash(&prev_hash)
            .ok_or(RejectReason::UnknownParent { prev_hash })?;
        trace!(%hash, parent_height = parent.height(), "parent resolved");

        // LedgerDerived
        let mut ledger = resolver.ledger_for(tree, parent);

        // InputsChecked
        ledger.try_apply_block(&block, self.verifier.as_ref())?;

        // CutoffChecked
        let max_height = tree.max_height();
        if self.is_stale(parent.height(), max_height) {
            return Err(RejectReason::StaleFork {
                parent_height: parent.height(),
                max_height,
            });
        }

        Ok(ValidatedBlock {
            hash,
            parent: parent.hash(),
            height: parent.height() + 1,
            ledger,
            block,
        })
    }

    /// A parent at or below `max_height - cutoff_age` can no longer be
    /// extended.
    pub fn is_stale(&self, parent_height: u64, max_height: u64) -> bool {
        parent_height.saturating_add(self.cutoff_age) <= max_height
    }

    /// Validate `block` and, on success, insert it, prune, and drop its
    /// transactions from `pool`.
    pub fn process(
        &self,
        tree: &mut BlockTree,
        pool: &mut TransactionPool,
        resolver: &BranchLedgerResolver,
        block: Block,
    ) -> Result<BlockAccepted, RejectReason> {
        let validated = self.validate(tree, resolver, block)?;
        let ValidatedBlock { block, hash, parent, height, ledger } = validated;

        let snapshot = resolver.caches_snapshots().then_some(ledger);
        let node = tree
            .insert(&parent, block, snapshot)
            .map_err(|_| RejectReason::UnknownParent { prev_hash: parent })?;
        let confirmed = pool.remove_confirmed(node.block());
        let pruned = tree.prune();

        Ok(BlockAccepted {
            hash,
            height,
            max_height: tree.max_height(),
            confirmed,
            pruned,
        })
    }
}
