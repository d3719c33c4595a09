//! # canopy-core
//! Ledger types and pure state for the canopy block tree: transactions,
//! blocks, the unspent output set and the pending transaction pool.

pub mod constants;
pub mod error;
pub mod ledger;
pub mod merkle;
pub mod traits;
pub mod tx_pool;
pub mod types;

pub use error::{CanopyError, ChainError, RejectReason};
pub use ledger::UtxoPool;
pub use traits::{AcceptAll, TransactionVerifier, ValueConservation};
pub use tx_pool::TransactionPool;
pub use types::{Block, BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput};
