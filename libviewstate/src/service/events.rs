//! Event bus for store observers
//!
//! Synchronous listeners registered with [`Store::subscribe`] see contexts
//! inside the dispatch cycle. Async consumers (the user loader, a UI task on
//! another runtime thread) instead read [`StoreEvent`]s from this bus.
//!
//! # Architecture
//!
//! The bus uses `tokio::sync::broadcast` for multi-subscriber support.
//! Emitting never blocks: with no subscribers the event is dropped, and a
//! lagging subscriber loses the oldest events rather than stalling dispatch.
//!
//! [`Store::subscribe`]: crate::store::Store::subscribe

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::store::{ActionRecord, DerivedContext};

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<StoreEvent>;

/// Broadcast channel of store events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified per-subscriber capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: StoreEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    /// Number of live receivers; for diagnostics only
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Events emitted by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// An action went through the reducer and reconciliation
    ActionApplied { record: ActionRecord },

    /// The derived context changed as a result
    ContextChanged { context: DerivedContext },
}
