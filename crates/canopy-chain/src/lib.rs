//! # canopy-chain — Fork tree, branch ledgers and block acceptance.
//!
//! - [`tree::BlockTree`] — hash-keyed node table, fork choice and pruning
//! - [`resolver::BranchLedgerResolver`] — UTXO set valid at any retained node
//! - [`validator::BlockValidator`] — the accept/reject decision
//! - [`chain::BlockChain`] — lock-guarded facade used by miners and relays

pub mod chain;
pub mod config;
pub mod events;
pub mod resolver;
pub mod tree;
pub mod validator;

pub use chain::BlockChain;
pub use config::{ChainConfig, LedgerStrategy};
pub use events::ChainEvent;
pub use resolver::BranchLedgerResolver;
pub use tree::{BlockNode, BlockTree, PruneStats};
pub use validator::{BlockAccepted, BlockValidator, ValidatedBlock};
