//! Core ledger types: transactions, blocks, outpoints.
//!
//! Hashing is deterministic over an explicit little-endian byte layout so
//! identifiers never depend on a serializer's framing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::merkle;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3), block header hashes (SHA-256),
/// merkle roots (BLAKE3) and owner identities. Ordering is lexicographic
/// over the raw bytes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Identifier of an unspent output: the producing transaction and the
/// position of the output within it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u64) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// The outpoint being spent.
    pub previous_output: OutPoint,
    /// Opaque signature bytes. Checked outside this crate, if at all.
    pub signature: Vec<u8>,
}

/// A transaction output, creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in base units.
    pub value: u64,
    /// Identity hash of the recipient.
    pub owner: Hash256,
}

/// A transaction transferring value between owners.
///
/// A transaction with no inputs is a coinbase.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Free-form discriminator. Coinbases set it to the block height so that
    /// two rewards paid to the same owner still get distinct ids.
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID.
    ///
    /// BLAKE3 over `version || lock_time || n_inputs || inputs || n_outputs ||
    /// outputs`, integers little-endian. Signatures are length-prefixed.
    pub fn txid(&self) -> Hash256 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.version.to_le_bytes());
        hasher.update(&self.lock_time.to_le_bytes());
        hasher.update(&(self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.previous_output.txid.as_bytes());
            hasher.update(&input.previous_output.index.to_le_bytes());
            hasher.update(&(input.signature.len() as u64).to_le_bytes());
            hasher.update(&input.signature);
        }
        hasher.update(&(self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            hasher.update(&output.value.to_le_bytes());
            hasher.update(output.owner.as_bytes());
        }
        Hash256(hasher.finalize().into())
    }

    /// Check if this is a coinbase transaction (no inputs).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Outpoints created by this transaction, in output order.
    pub fn outpoints(&self) -> impl Iterator<Item = (OutPoint, &TxOutput)> {
        let txid = self.txid();
        self.outputs
            .iter()
            .enumerate()
            .map(move |(index, output)| (OutPoint::new(txid, index as u64), output))
    }
}

/// Block header. The block hash commits to the parent and, through the
/// merkle root, to every transaction in the block.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Hash of the previous block header.
    pub prev_hash: Hash256,
    /// BLAKE3 merkle root over the coinbase txid followed by every listed txid.
    pub merkle_root: Hash256,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Free nonce, lets callers mint distinct sibling blocks.
    pub nonce: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing (3 u64 fields + 2 * 32-byte hashes).
    const HASH_SIZE: usize = 3 * 8 + 2 * 32;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Layout: version || prev_hash || merkle_root || timestamp || nonce,
    /// all little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header, coinbase reward and listed transactions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    /// Reward-issuing transaction. Its outputs are spendable by any listed
    /// transaction of the same block.
    pub coinbase: Transaction,
    /// Ordered list of non-coinbase transactions.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a block on `prev_hash`, filling in the merkle root.
    pub fn new(
        prev_hash: Hash256,
        timestamp: u64,
        nonce: u64,
        coinbase: Transaction,
        transactions: Vec<Transaction>,
    ) -> Self {
        let mut block = Self {
            header: BlockHeader {
                version: 1,
                prev_hash,
                merkle_root: Hash256::ZERO,
                timestamp,
                nonce,
            },
            coinbase,
            transactions,
        };
        block.header.merkle_root = block.compute_merkle_root();
        block
    }

    /// Block hash (the header hash).
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Declared parent hash.
    pub fn prev_hash(&self) -> Hash256 {
        self.header.prev_hash
    }

    /// IDs of the listed transactions, in block order. Excludes the coinbase.
    pub fn txids(&self) -> Vec<Hash256> {
        self.transactions.iter().map(Transaction::txid).collect()
    }

    /// Merkle root over the coinbase txid followed by the listed txids.
    pub fn compute_merkle_root(&self) -> Hash256 {
        let mut leaves = Vec::with_capacity(self.transactions.len() + 1);
        leaves.push(self.coinbase.txid());
        leaves.extend(self.transactions.iter().map(Transaction::txid));
        merkle::merkle_root(&leaves)
    }

    /// Whether the header's merkle root matches the block contents.
    pub fn has_valid_merkle_root(&self) -> bool {
        self.header.merkle_root == self.compute_merkle_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Hash256 {
        Hash256([0xAA; 32])
    }

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::new(Hash256([0x11; 32]), 0),
                signature: vec![0u8; 64],
            }],
            outputs: vec![TxOutput {
                value: 50,
                owner: owner(),
            }],
            lock_time: 0,
        }
    }

    fn sample_coinbase(height: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                value: 25,
                owner: owner(),
            }],
            lock_time: height,
        }
    }

    // --- Hash256 ---

    #[test]
    fn hash256_zero_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert!(!Hash256([1; 32]).is_zero());
    }

    #[test]
    fn hash256_display_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        bytes[31] = 0x01;
        let s = Hash256(bytes).to_string();
        assert_eq!(s.len(), 64);
        assert!(s.starts_with("ab"));
        assert!(s.ends_with("01"));
    }

    #[test]
    fn hash256_orders_lexicographically() {
        let mut low = [0xFF; 32];
        low[0] = 0x00;
        let mut high = [0x00; 32];
        high[0] = 0x01;
        assert!(Hash256(low) < Hash256(high));
    }

    #[test]
    fn outpoint_display() {
        let op = OutPoint::new(Hash256::ZERO, 3);
        assert!(op.to_string().ends_with(":3"));
    }

    // --- Transaction ---

    #[test]
    fn coinbase_detection() {
        assert!(sample_coinbase(1).is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn txid_deterministic() {
        assert_eq!(sample_tx().txid(), sample_tx().txid());
    }

    #[test]
    fn txid_changes_with_data() {
        let mut tx = sample_tx();
        let before = tx.txid();
        tx.outputs[0].value += 1;
        assert_ne!(before, tx.txid());
    }

    #[test]
    fn coinbase_txid_distinct_per_height() {
        assert_ne!(sample_coinbase(1).txid(), sample_coinbase(2).txid());
    }

    #[test]
    fn signature_bytes_are_length_prefixed() {
        let mut a = sample_tx();
        a.inputs[0].signature = vec![1, 2];
        let mut b = sample_tx();
        b.inputs[0].signature = vec![1];
        assert_ne!(a.txid(), b.txid());
    }

    #[test]
    fn total_output_value_overflow_returns_none() {
        let mut tx = sample_tx();
        tx.outputs.push(TxOutput {
            value: u64::MAX,
            owner: owner(),
        });
        assert_eq!(tx.total_output_value(), None);
        assert_eq!(sample_tx().total_output_value(), Some(50));
    }

    #[test]
    fn outpoints_follow_output_order() {
        let mut tx = sample_tx();
        tx.outputs.push(TxOutput { value: 7, owner: owner() });
        let ops: Vec<_> = tx.outpoints().map(|(op, out)| (op.index, out.value)).collect();
        assert_eq!(ops, vec![(0, 50), (1, 7)]);
    }

    // --- Block ---

    #[test]
    fn block_hash_commits_to_transactions() {
        let a = Block::new(Hash256::ZERO, 1, 0, sample_coinbase(1), vec![]);
        let b = Block::new(Hash256::ZERO, 1, 0, sample_coinbase(1), vec![sample_tx()]);
        assert_ne!(a.hash(), b.hash());
        assert!(a.has_valid_merkle_root());
        assert!(b.has_valid_merkle_root());
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let a = Block::new(Hash256::ZERO, 1, 0, sample_coinbase(1), vec![]);
        let b = Block::new(Hash256::ZERO, 1, 1, sample_coinbase(1), vec![]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn tampered_block_fails_merkle_check() {
        let mut block = Block::new(Hash256::ZERO, 1, 0, sample_coinbase(1), vec![]);
        block.transactions.push(sample_tx());
        assert!(!block.has_valid_merkle_root());
    }

    #[test]
    fn block_accessors() {
        let prev = Hash256([0x42; 32]);
        let block = Block::new(prev, 1, 0, sample_coinbase(1), vec![sample_tx()]);
        assert_eq!(block.prev_hash(), prev);
        assert_eq!(block.txids(), vec![sample_tx().txid()]);
    }

    #[test]
    fn serde_json_round_trip_block() {
        let block = Block::new(Hash256::ZERO, 1, 0, sample_coinbase(1), vec![sample_tx()]);
        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.hash());
    }
}
