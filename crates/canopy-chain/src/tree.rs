//! Bounded tree of candidate blocks.
//!
//! Nodes live in a flat table keyed by block hash; parent and child links
//! are hashes into that table. The root (genesis) anchors every branch and is
//! never pruned. Traversals are iterative so neither depth nor fork width is
//! limited by the call stack.

use std::collections::{HashMap, HashSet, VecDeque};

use canopy_core::constants::GENESIS_HEIGHT;
use canopy_core::error::ChainError;
use canopy_core::{Block, Hash256, UtxoPool};

/// One accepted block's position in the tree.
#[derive(Debug, Clone)]
pub struct BlockNode {
    hash: Hash256,
    height: u64,
    block: Block,
    parent: Option<Hash256>,
    children: Vec<Hash256>,
    snapshot: Option<UtxoPool>,
}

impl BlockNode {
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Parent hash, `None` only for the root.
    pub fn parent(&self) -> Option<Hash256> {
        self.parent
    }

    /// Child hashes in insertion order.
    pub fn children(&self) -> &[Hash256] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Cached ledger valid immediately after this block, if any.
    pub fn snapshot(&self) -> Option<&UtxoPool> {
        self.snapshot.as_ref()
    }
}

/// Outcome of one [`BlockTree::prune`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Nodes discarded with their subtrees.
    pub removed: usize,
    /// Retained nodes whose ledger snapshot was dropped.
    pub snapshots_evicted: usize,
}

#[derive(Debug, Clone)]
pub struct BlockTree {
    nodes: HashMap<Hash256, BlockNode>,
    root: Hash256,
    cutoff_age: u64,
}

impl BlockTree {
    /// Create a tree holding only `genesis` at height 0.
    ///
    /// The genesis block is trusted as given.
    pub fn new(genesis: Block, cutoff_age: u64) -> Self {
        let root = genesis.hash();
        let node = BlockNode {
            hash: root,
            height: GENESIS_HEIGHT,
            block: genesis,
            parent: None,
            children: Vec::new(),
            snapshot: None,
        };
        Self {
            nodes: HashMap::from([(root, node)]),
            root,
            cutoff_age,
        }
    }

    pub fn cutoff_age(&self) -> u64 {
        self.cutoff_age
    }

    pub fn root(&self) -> &BlockNode {
        &self.nodes[&self.root]
    }

    /// Number of retained nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root is never removed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up the retained node for `hash`, wherever it sits in the tree.
    pub fn find_by_hash(&self, hash: &Hash256) -> Option<&BlockNode> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Breadth-first walk over every retained node, root first.
    pub fn iter(&self) -> impl Iterator<Item = &BlockNode> {
        let mut queue = VecDeque::from([self.root]);
        std::iter::from_fn(move || {
            let node = self.nodes.get(&queue.pop_front()?)?;
            queue.extend(node.children.iter().copied());
            Some(node)
        })
    }

    pub fn leaves(&self) -> impl Iterator<Item = &BlockNode> {
        self.iter().filter(|node| node.is_leaf())
    }

    /// Walk from `node` up to the root, `node` first.
    pub fn ancestors<'a>(&'a self, node: &'a BlockNode) -> impl Iterator<Item = &'a BlockNode> {
        std::iter::successors(Some(node), move |current| {
            current.parent.and_then(|parent| self.nodes.get(&parent))
        })
    }

    /// The best leaf: greatest height, smallest hash among equals.
    pub fn max_height_node(&self) -> &BlockNode {
        let mut best = self.root();
        for leaf in self.leaves() {
            if (leaf.height, std::cmp::Reverse(leaf.hash))
                > (best.height, std::cmp::Reverse(best.hash))
            {
                best = leaf;
            }
        }
        best
    }

    pub fn max_height(&self) -> u64 {
        self.max_height_node().height
    }

    /// Append `block` under `parent`. Validity is the caller's concern.
    ///
    /// Inserting a hash that is already retained under the same `parent`
    /// returns the existing node unchanged; under any other parent it fails
    /// with [`ChainError::ParentMismatch`].
    pub fn insert(
        &mut self,
        parent: &Hash256,
        block: Block,
        snapshot: Option<UtxoPool>,
    ) -> Result<&BlockNode, ChainError> {
        let hash = block.hash();
        if let Some(recorded) = self.nodes.get(&hash).map(|node| node.parent) {
            if recorded != Some(*parent) {
                return Err(ChainError::ParentMismatch { hash, parent: *parent });
            }
            return Ok(&self.nodes[&hash]);
        }
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or(ChainError::NodeNotFound(*parent))?;
        parent_node.children.push(hash);
        let height = parent_node.height + 1;
        let node = BlockNode {
            hash,
            height,
            block,
            parent: Some(*parent),
            children: Vec::new(),
            snapshot,
        };
        self.nodes.insert(hash, node);
        Ok(&self.nodes[&hash])
    }

    /// Attach or replace the ledger snapshot of a retained node.
    pub fn set_snapshot(&mut self, hash: &Hash256, snapshot: UtxoPool) -> Result<(), ChainError> {
        let node = self
            .nodes
            .get_mut(hash)
            .ok_or(ChainError::NodeNotFound(*hash))?;
        node.snapshot = Some(snapshot);
        Ok(())
    }

    pub fn set_root_snapshot(&mut self, snapshot: UtxoPool) {
        if let Some(root) = self.nodes.get_mut(&self.root) {
            root.snapshot = Some(snapshot);
        }
    }

    /// Lowest height a node needs to stay unconditionally retained.
    pub fn retention_floor(&self) -> u64 {
        self.max_height().saturating_sub(self.cutoff_age)
    }

    /// Drop dead subtrees.
    ///
    /// A node survives if it is the root, if its height is at least
    /// `max_height - cutoff_age`, or if any descendant survives. Survivors
    /// below that floor also lose their ledger snapshot, except the root,
    /// which keeps the anchor every branch ledger is rebuilt from.
    pub fn prune(&mut self) -> PruneStats {
        let floor = self.retention_floor();

        let mut keep: HashSet<Hash256> = HashSet::with_capacity(self.nodes.len());
        keep.insert(self.root);
        for node in self.nodes.values() {
            if node.height < floor {
                continue;
            }
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                if !keep.insert(current.hash) {
                    break;
                }
                cursor = current.parent.and_then(|p| self.nodes.get(&p));
            }
        }

        let doomed: Vec<Hash256> = self
            .nodes
            .keys()
            .filter(|hash| !keep.contains(*hash))
            .copied()
            .collect();
        for hash in &doomed {
            let Some(node) = self.nodes.remove(hash) else {
                continue;
            };
            if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
                parent.children.retain(|child| child != hash);
            }
        }

        let mut snapshots_evicted = 0;
        for node in self.nodes.values_mut() {
            if node.hash != self.root && node.height < floor && node.snapshot.take().is_some() {
                snapshots_evicted += 1;
            }
        }

        PruneStats {
            removed: doomed.len(),
            snapshots_evicted,
        }
    }
}
