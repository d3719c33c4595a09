//! Protocol constants.

/// Maximum number of blocks a competing branch may lag behind the best chain
/// before it can no longer be extended and its history becomes reclaimable.
pub const CUTOFF_AGE: u64 = 10;

/// Height of the genesis block.
pub const GENESIS_HEIGHT: u64 = 0;
