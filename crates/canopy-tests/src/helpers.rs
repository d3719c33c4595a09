//! Shared test helpers for integration and property tests.

use canopy_chain::{BlockChain, BlockTree, BranchLedgerResolver, LedgerStrategy};
use canopy_core::{Block, Hash256, OutPoint, Transaction, TxInput, TxOutput};

/// Reward paid by every helper coinbase.
pub const REWARD: u64 = 50;

/// Simple owner identity from a seed byte.
pub fn pkh(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// Coinbase paying `value` to `owner`. `tag` keeps txids distinct.
pub fn make_coinbase(value: u64, owner: Hash256, tag: u64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![],
        outputs: vec![TxOutput { value, owner }],
        lock_time: tag,
    }
}

/// Unsigned spending transaction.
pub fn make_tx(inputs: Vec<OutPoint>, outputs: Vec<(u64, Hash256)>) -> Transaction {
    Transaction {
        version: 1,
        inputs: inputs
            .into_iter()
            .map(|op| TxInput { previous_output: op, signature: vec![0; 64] })
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|(value, owner)| TxOutput { value, owner })
            .collect(),
        lock_time: 0,
    }
}

/// Outpoint of the first output of `tx`.
pub fn first_output(tx: &Transaction) -> OutPoint {
    OutPoint::new(tx.txid(), 0)
}

pub fn genesis() -> Block {
    Block::new(Hash256::ZERO, 0, 0, make_coinbase(REWARD, pkh(0), 0), vec![])
}

/// Mints blocks whose coinbases never collide.
#[derive(Debug, Default)]
pub struct BlockFactory {
    next_tag: u64,
}

impl BlockFactory {
    pub fn new() -> Self {
        // Tag 0 belongs to the genesis coinbase.
        Self { next_tag: 1 }
    }

    pub fn block_on(&mut self, prev: Hash256, txs: Vec<Transaction>) -> Block {
        let tag = self.next_tag;
        self.next_tag += 1;
        Block::new(prev, tag, tag, make_coinbase(REWARD, pkh(1), tag), txs)
    }

    /// Extend `from` by `n` empty blocks on `chain`, returning every block
    /// added in order. Panics if any is rejected.
    pub fn extend(&mut self, chain: &BlockChain, from: Hash256, n: u64) -> Vec<Block> {
        let mut tip = from;
        let mut added = Vec::new();
        for _ in 0..n {
            let block = self.block_on(tip, vec![]);
            tip = block.hash();
            assert!(chain.add_block(block.clone()), "extension rejected at {tip}");
            added.push(block);
        }
        added
    }
}

/// Check structural invariants that must hold after every accepted block:
///
/// - the root has height 0 and every child is one above its parent
/// - every node is either the root, within `cutoff_age` of the best height,
///   or an ancestor of a node that is
pub fn check_tree_invariants(tree: &BlockTree) -> Result<(), String> {
    if tree.root().height() != 0 {
        return Err(format!("root height {}", tree.root().height()));
    }
    let visited = tree.iter().count();
    if visited != tree.len() {
        return Err(format!("{visited} reachable of {} retained", tree.len()));
    }

    let max_height = tree.max_height();
    let floor = max_height.saturating_sub(tree.cutoff_age());
    for node in tree.iter() {
        for child in node.children() {
            let child = tree
                .find_by_hash(child)
                .ok_or_else(|| format!("dangling child {child}"))?;
            if child.height() != node.height() + 1 {
                return Err(format!(
                    "child {} at {} under parent at {}",
                    child.hash(),
                    child.height(),
                    node.height()
                ));
            }
            if child.parent() != Some(node.hash()) {
                return Err(format!("child {} has wrong parent link", child.hash()));
            }
        }
        let is_root = node.parent().is_none();
        let in_window = node.height() >= floor;
        let has_live_descendant = !node.is_leaf();
        if !is_root && !in_window && !has_live_descendant {
            return Err(format!(
                "dead leaf {} at {} retained (best {max_height})",
                node.hash(),
                node.height()
            ));
        }
    }
    Ok(())
}

/// Check that replay and incremental resolution agree at every node.
pub fn check_ledger_equivalence(tree: &BlockTree) -> Result<(), String> {
    let replay = BranchLedgerResolver::new(LedgerStrategy::Replay);
    let incremental = BranchLedgerResolver::new(LedgerStrategy::Incremental);
    for node in tree.iter() {
        let a = replay.ledger_for(tree, node);
        let b = incremental.ledger_for(tree, node);
        if a != b {
            return Err(format!(
                "ledgers differ at {} (height {}): replay {} utxos, incremental {}",
                node.hash(),
                node.height(),
                a.len(),
                b.len()
            ));
        }
    }
    Ok(())
}
