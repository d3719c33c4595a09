//! Unspent output set valid at one point of one branch.
//!
//! [`UtxoPool`] is plain data. The two ways a block moves it forward share a
//! single ordering rule:
//!
//! 1. the coinbase outputs are added,
//! 2. each listed transaction, in order, removes its inputs and then adds
//!    its outputs.
//!
//! So a transaction may spend the coinbase or any earlier-listed output of
//! the same block, but never an output listed after it.
//! [`apply_block`](UtxoPool::apply_block) trusts the block;
//! [`try_apply_block`](UtxoPool::try_apply_block) checks every input.

use std::collections::{HashMap, HashSet};

use crate::error::RejectReason;
use crate::traits::TransactionVerifier;
use crate::types::{Block, OutPoint, Transaction, TxOutput};

/// Mapping from outpoint to the output it identifies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoPool {
    utxos: HashMap<OutPoint, TxOutput>,
}

impl UtxoPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an output.
    pub fn add_utxo(&mut self, outpoint: OutPoint, output: TxOutput) {
        self.utxos.insert(outpoint, output);
    }

    /// Remove an output, returning it if it was present.
    pub fn remove_utxo(&mut self, outpoint: &OutPoint) -> Option<TxOutput> {
        self.utxos.remove(outpoint)
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.utxos.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.utxos.iter()
    }

    /// All outpoints, sorted. Handy for deterministic output.
    pub fn outpoints(&self) -> Vec<OutPoint> {
        let mut all: Vec<OutPoint> = self.utxos.keys().cloned().collect();
        all.sort();
        all
    }

    /// Sum of all output values, saturating.
    pub fn total_value(&self) -> u64 {
        self.utxos
            .values()
            .fold(0u64, |acc, out| acc.saturating_add(out.value))
    }

    fn add_outputs(&mut self, tx: &Transaction) {
        for (outpoint, output) in tx.outpoints() {
            self.utxos.insert(outpoint, output.clone());
        }
    }

    /// Apply one already-accepted block. Missing inputs are ignored.
    pub fn apply_block(&mut self, block: &Block) {
        self.add_outputs(&block.coinbase);
        for tx in &block.transactions {
            for input in &tx.inputs {
                self.utxos.remove(&input.previous_output);
            }
            self.add_outputs(tx);
        }
    }

    /// Apply one candidate block, checking every input as it goes.
    ///
    /// Only the block's own coinbase may have no inputs. Each input of a
    /// listed transaction must be present in the pool at the moment its
    /// transaction is reached and claimed once; once spent it is gone, so a
    /// second claim on the same outpoint anywhere later in the block fails.
    /// `verifier` sees each transaction after its inputs are found and
    /// before they are consumed.
    ///
    /// On error the pool is left partially updated; callers work on a copy.
    pub fn try_apply_block(
        &mut self,
        block: &Block,
        verifier: &dyn TransactionVerifier,
    ) -> Result<(), RejectReason> {
        self.add_outputs(&block.coinbase);
        for tx in &block.transactions {
            let txid = tx.txid();
            if tx.is_coinbase() {
                return Err(RejectReason::ExtraCoinbase { txid });
            }
            let mut claimed = HashSet::with_capacity(tx.inputs.len());
            for input in &tx.inputs {
                let outpoint = &input.previous_output;
                if !claimed.insert(outpoint) || !self.utxos.contains_key(outpoint) {
                    return Err(RejectReason::InvalidInputOrDoubleSpend {
                        txid,
                        outpoint: outpoint.clone(),
                    });
                }
            }
            if !verifier.verify(tx, self) {
                return Err(RejectReason::VerificationFailed { txid });
            }
            for input in &tx.inputs {
                self.utxos.remove(&input.previous_output);
            }
            self.add_outputs(tx);
        }
        Ok(())
    }
}

impl FromIterator<(OutPoint, TxOutput)> for UtxoPool {
    fn from_iter<I: IntoIterator<Item = (OutPoint, TxOutput)>>(iter: I) -> Self {
        Self {
            utxos: iter.into_iter().collect(),
        }
    }
}
