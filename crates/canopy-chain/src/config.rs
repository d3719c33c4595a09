//! Chain configuration.
//!
//! [`ChainConfig`] has working defaults and can be customized in code or
//! loaded from a file with `CANOPY_*` environment overrides.

use std::path::Path;

use canopy_core::constants::CUTOFF_AGE;
use canopy_core::error::ChainError;
use serde::{Deserialize, Serialize};

/// Default capacity of the chain event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// How the ledger at a tree node is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStrategy {
    /// Rebuild from the root on every query. No per-node state.
    Replay,
    /// Keep a snapshot on each extendable node and apply single blocks on
    /// top of the nearest cached ancestor.
    #[default]
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Blocks a fork may trail the best chain by before it is frozen.
    pub cutoff_age: u64,
    pub ledger_strategy: LedgerStrategy,
    /// Buffered events per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            cutoff_age: CUTOFF_AGE,
            ledger_strategy: LedgerStrategy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ChainConfig {
    /// Load from `path` (format picked by extension), then apply
    /// `CANOPY_CUTOFF_AGE`-style environment overrides.
    pub fn load(path: &Path) -> Result<Self, ChainError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("CANOPY").try_parsing(true))
            .build()
            .map_err(|e| ChainError::Config(e.to_string()))?;
        let cfg: Self = settings
            .try_deserialize()
            .map_err(|e| ChainError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.cutoff_age == 0 {
            return Err(ChainError::Config("cutoff_age must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(ChainError::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn with_cutoff_age(mut self, cutoff_age: u64) -> Self {
        self.cutoff_age = cutoff_age;
        self
    }

    pub fn with_ledger_strategy(mut self, strategy: LedgerStrategy) -> Self {
        self.ledger_strategy = strategy;
        self
    }
}
