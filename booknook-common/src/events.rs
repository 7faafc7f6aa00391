//! Store change events and the broadcast bus that carries them
//!
//! Live subscriptions never receive review data over the bus. An event
//! only says *which* filtered result set changed; each subscriber re-reads
//! the full set from the store, so a dropped or lagged event costs one
//! extra query and never loses data.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Change notification emitted by a document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    /// A review document was appended with a pending timestamp
    ReviewAdded {
        collection: String,
        book_id: String,
        review_id: String,
    },

    /// The store stamped `createdAt` on a previously pending review
    ReviewTimestamped {
        collection: String,
        book_id: String,
        review_id: String,
    },

    /// A pending review was removed because its append did not complete
    ReviewWithdrawn {
        collection: String,
        book_id: String,
        review_id: String,
    },
}

impl StoreEvent {
    /// Event name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::ReviewAdded { .. } => "ReviewAdded",
            StoreEvent::ReviewTimestamped { .. } => "ReviewTimestamped",
            StoreEvent::ReviewWithdrawn { .. } => "ReviewWithdrawn",
        }
    }

    /// True if this change affects the reviews of `book_id` in `collection`
    pub fn touches(&self, collection: &str, book_id: &str) -> bool {
        match self {
            StoreEvent::ReviewAdded {
                collection: c,
                book_id: b,
                ..
            }
            | StoreEvent::ReviewTimestamped {
                collection: c,
                book_id: b,
                ..
            }
            | StoreEvent::ReviewWithdrawn {
                collection: c,
                book_id: b,
                ..
            } => c == collection && b == book_id,
        }
    }
}

/// Broadcast bus for store change events
///
/// Backed by `tokio::sync::broadcast`: publishing never blocks, slow
/// subscribers observe `Lagged`, and receivers clean up on drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use booknook_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Store writes succeed whether or not anyone is watching.
    pub fn emit_lossy(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
