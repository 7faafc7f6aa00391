//! Document store access
//!
//! Reviews live in a document collection at
//! `/artifacts/<appId>/public/data/reviews`. Two read paths exist:
//! - one-shot snapshots ([`DocumentStore::reviews_for_book`]), used by page
//!   loaders on the server
//! - live subscriptions ([`subscribe_reviews`]), used by the review widget
//!   and the SSE endpoint
//!
//! The single write path is [`DocumentStore::add_review`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::events::StoreEvent;
use crate::models::{NewReview, Review};
use crate::Result;

mod registry;
mod shared;
mod sqlite;
mod subscription;

pub use registry::{RegisterOutcome, StoreRegistry};
pub use shared::{Connector, SharedConnection, SqliteConnector};
pub use sqlite::SqliteDocumentStore;
pub use subscription::{subscribe_reviews, SnapshotStream, Subscription};

/// Shared, ready-to-use handle to a document store
pub type StoreHandle = Arc<dyn DocumentStore>;

/// Path of a document collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Public reviews collection for an application
    pub fn reviews(app_id: &str) -> Self {
        Self(format!("/artifacts/{}/public/data/reviews", app_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations the application needs from a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name the store was registered under (its project id)
    fn name(&self) -> &str;

    /// Append a review; returns the store-assigned document id
    ///
    /// The document is first visible with a pending `createdAt`, then
    /// stamped with the store clock.
    async fn add_review(&self, collection: &CollectionPath, review: NewReview) -> Result<String>;

    /// All reviews of `book_id` in `collection`, in insertion order
    async fn reviews_for_book(&self, collection: &CollectionPath, book_id: &str)
        -> Result<Vec<Review>>;

    /// Receiver for change notifications emitted after each write
    fn changes(&self) -> broadcast::Receiver<StoreEvent>;

    /// Release underlying resources; called once at process shutdown
    async fn close(&self);
}
