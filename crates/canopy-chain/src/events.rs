//! Domain events published by the chain.
//!
//! Every accept/reject/prune decision is logged through `tracing` and also
//! broadcast as a [`ChainEvent`] so that observers (metrics, relays, tests)
//! can follow the chain without hooking into its control flow.

use canopy_core::{Hash256, RejectReason};
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    BlockAccepted { hash: Hash256, height: u64 },
    BlockRejected { hash: Hash256, reason: RejectReason },
    NodesPruned { removed: usize, max_height: u64 },
    TransactionAdded { txid: Hash256 },
}

/// Fan-out point for [`ChainEvent`]s.
#[derive(Debug)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<ChainEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: ChainEvent) {
        match &event {
            ChainEvent::BlockAccepted { hash, height } => {
                debug!(%hash, height, "accepted block");
            }
            ChainEvent::BlockRejected { hash, reason } => {
                debug!(%hash, kind = reason.kind(), "rejected block: {reason}");
            }
            ChainEvent::NodesPruned { removed, max_height } => {
                info!(removed, max_height, "pruned dead forks");
            }
            ChainEvent::TransactionAdded { txid } => {
                trace!(%txid, "added transaction to pool");
            }
        }
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}
