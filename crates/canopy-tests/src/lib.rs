//! Integration and property tests for the canopy block tree.
//!
//! Exercises the public [`BlockChain`](canopy_chain::BlockChain) API across
//! forks, pruning, ledger resolution and concurrent readers.

pub mod helpers;
