//! Error types for the canopy ledger core.
use thiserror::Error;

use crate::types::{Hash256, OutPoint};

/// Why a block was not added to the tree.
///
/// Rejections are ordinary outcomes of processing untrusted blocks. The tree
/// and the transaction pool are unchanged whenever one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("unknown parent {prev_hash}")] UnknownParent { prev_hash: Hash256 },
    #[error("duplicate block {0}")] DuplicateBlock(Hash256),
    #[error("input {outpoint} of tx {txid} is missing or already spent")]
    InvalidInputOrDoubleSpend { txid: Hash256, outpoint: OutPoint },
    #[error("transaction {txid} failed verification")] VerificationFailed { txid: Hash256 },
    #[error("transaction {txid} has no inputs but is not the block coinbase")]
    ExtraCoinbase { txid: Hash256 },
    #[error("stale fork: parent height {parent_height}, best height {max_height}")]
    StaleFork { parent_height: u64, max_height: u64 },
}

impl RejectReason {
    /// Short stable label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownParent { .. } => "unknown_parent",
            Self::DuplicateBlock(_) => "duplicate_block",
            Self::InvalidInputOrDoubleSpend { .. } => "invalid_input",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::ExtraCoinbase { .. } => "extra_coinbase",
            Self::StaleFork { .. } => "stale_fork",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("node not retained: {0}")] NodeNotFound(Hash256),
    #[error("block {hash} is already retained under a different parent than {parent}")]
    ParentMismatch { hash: Hash256, parent: Hash256 },
    #[error("config: {0}")] Config(String),
}

#[derive(Error, Debug)]
pub enum CanopyError {
    #[error(transparent)] Rejected(#[from] RejectReason),
    #[error(transparent)] Chain(#[from] ChainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_display() {
        let err = RejectReason::StaleFork { parent_height: 1, max_height: 11 };
        assert_eq!(err.to_string(), "stale fork: parent height 1, best height 11");
    }

    #[test]
    fn reject_reason_kinds_are_distinct() {
        let reasons = [
            RejectReason::UnknownParent { prev_hash: Hash256::ZERO },
            RejectReason::DuplicateBlock(Hash256::ZERO),
            RejectReason::InvalidInputOrDoubleSpend {
                txid: Hash256::ZERO,
                outpoint: OutPoint::new(Hash256::ZERO, 0),
            },
            RejectReason::VerificationFailed { txid: Hash256::ZERO },
            RejectReason::ExtraCoinbase { txid: Hash256::ZERO },
            RejectReason::StaleFork { parent_height: 0, max_height: 10 },
        ];
        let mut kinds: Vec<_> = reasons.iter().map(RejectReason::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), reasons.len());
    }

    #[test]
    fn canopy_error_wraps_transparently() {
        let err: CanopyError = ChainError::NodeNotFound(Hash256::ZERO).into();
        assert!(err.to_string().starts_with("node not retained"));
    }
}
