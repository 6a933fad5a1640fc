//! Event types for the VGate event system
//!
//! Gate events are broadcast via [`EventBus`] and serialized for SSE so
//! operational dashboards see decisions as they are recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Gate event types
///
/// Outcomes and directions are carried as their wire strings
/// ("authorized", "entrada", ...) so this crate stays free of domain types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GateEvent {
    /// A detection was evaluated and written to the ledger
    AccessDecided {
        attempt_id: Uuid,
        plate: String,
        outcome: String,
        direction: String,
        camera_id: Option<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A human changed the outcome of a recorded attempt
    AccessOverridden {
        attempt_id: Uuid,
        actor: String,
        previous_outcome: String,
        new_outcome: String,
        timestamp: DateTime<Utc>,
    },

    /// Ledger entries older than `cutoff` were hard-deleted
    LedgerPurged {
        actor: String,
        cutoff: DateTime<Utc>,
        deleted_attempts: u64,
        timestamp: DateTime<Utc>,
    },

    /// Access policy thresholds were changed
    PolicyUpdated {
        actor: String,
        timestamp: DateTime<Utc>,
    },
}

impl GateEvent {
    /// Get event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &'static str {
        match self {
            GateEvent::AccessDecided { .. } => "AccessDecided",
            GateEvent::AccessOverridden { .. } => "AccessOverridden",
            GateEvent::LedgerPurged { .. } => "LedgerPurged",
            GateEvent::PolicyUpdated { .. } => "PolicyUpdated",
        }
    }
}

/// Broadcast bus for gate events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GateEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: GateEvent) -> Result<usize, broadcast::error::SendError<GateEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// The ledger is the record of truth; the bus is a notification channel.
    pub fn emit_lossy(&self, event: GateEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
