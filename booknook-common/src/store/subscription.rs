//! Live review subscriptions
//!
//! A subscription is a lazy, infinite sequence of *full* result sets for
//! one filter. Every relevant store change yields the complete current
//! list, never a delta, so consumers replace what they display wholesale.

use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CollectionPath, StoreHandle};
use crate::models::Review;
use crate::Result;

/// Boxed stream of review snapshots
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Vec<Review>>> + Send>>;

/// Cancellable handle over a snapshot stream
///
/// Once cancelled, [`Subscription::next`] returns `None` forever; a
/// subscription cannot be restarted, open a new one instead.
pub struct Subscription {
    stream: SnapshotStream,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(stream: SnapshotStream) -> Self {
        Self {
            stream,
            cancel: CancellationToken::new(),
        }
    }

    /// Next snapshot, or `None` once cancelled or the store has gone away
    ///
    /// An `Err` item is a failed re-read; the subscription stays open and
    /// later changes are still delivered.
    pub async fn next(&mut self) -> Option<Result<Vec<Review>>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.stream.next() => item,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this subscription from another task
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Adapt into a plain stream that ends on cancellation
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Vec<Review>>> + Send {
        async_stream::stream! {
            while let Some(item) = self.next().await {
                yield item;
            }
        }
    }
}

/// Subscribe to the reviews of `book_id` in `collection`
///
/// The change receiver is attached before the initial read, so a write
/// racing with subscription setup is never missed.
pub fn subscribe_reviews(
    store: StoreHandle,
    collection: CollectionPath,
    book_id: impl Into<String>,
) -> Subscription {
    let book_id = book_id.into();
    let mut changes = store.changes();

    let stream = async_stream::stream! {
        debug!(collection = %collection, book_id = %book_id, "Live review subscription opened");
        yield store.reviews_for_book(&collection, &book_id).await;

        loop {
            match changes.recv().await {
                Ok(event) => {
                    if !event.touches(collection.as_str(), &book_id) {
                        continue;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(book_id = %book_id, skipped, "Subscription lagged, re-reading full set");
                }
                Err(RecvError::Closed) => {
                    debug!(book_id = %book_id, "Store change feed closed");
                    break;
                }
            }

            yield store.reviews_for_book(&collection, &book_id).await;
        }
    };

    Subscription::new(Box::pin(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewReview, Rating};
    use crate::store::SqliteDocumentStore;
    use std::sync::Arc;
    use std::time::Duration;

    async fn store() -> StoreHandle {
        Arc::new(SqliteDocumentStore::in_memory("sub-test").await.unwrap())
    }

    fn review(book_id: &str, text: &str) -> NewReview {
        NewReview::new(book_id, "user-1", Rating::default(), text).unwrap()
    }

    #[tokio::test]
    async fn test_first_item_is_current_set() {
        let store = store().await;
        let collection = CollectionPath::reviews("app");
        store.add_review(&collection, review("b1", "existing")).await.unwrap();

        let mut sub = subscribe_reviews(store.clone(), collection, "b1");
        let first = sub.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "existing");
    }

    #[tokio::test]
    async fn test_write_yields_full_set_with_pending_then_stamped() {
        let store = store().await;
        let collection = CollectionPath::reviews("app");
        store.add_review(&collection, review("b1", "one")).await.unwrap();

        let mut sub = subscribe_reviews(store.clone(), collection.clone(), "b1");
        assert_eq!(sub.next().await.unwrap().unwrap().len(), 1);

        store.add_review(&collection, review("b1", "two")).await.unwrap();

        // Two change events per append; every delivery is the full set
        let after_added = sub.next().await.unwrap().unwrap();
        let after_stamped = sub.next().await.unwrap().unwrap();
        assert_eq!(after_added.len(), 2);
        assert_eq!(after_stamped.len(), 2);
        assert!(after_stamped.iter().all(|r| r.created_at.is_some()));
    }

    #[tokio::test]
    async fn test_other_books_do_not_wake_subscriber() {
        let store = store().await;
        let collection = CollectionPath::reviews("app");

        let mut sub = subscribe_reviews(store.clone(), collection.clone(), "b1");
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        store.add_review(&collection, review("b2", "elsewhere")).await.unwrap();

        let woke = tokio::time::timeout(Duration::from_millis(100), sub.next()).await;
        assert!(woke.is_err(), "change to another book must not yield a snapshot");
    }

    #[tokio::test]
    async fn test_cancelled_subscription_never_yields_again() {
        let store = store().await;
        let collection = CollectionPath::reviews("app");

        let mut sub = subscribe_reviews(store.clone(), collection.clone(), "b1");
        sub.next().await.unwrap().unwrap();

        sub.cancel();
        assert!(sub.is_cancelled());

        store.add_review(&collection, review("b1", "late")).await.unwrap();
        assert!(sub.next().await.is_none());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_pending_next() {
        let store = store().await;
        let mut sub = subscribe_reviews(store, CollectionPath::reviews("app"), "b1");
        sub.next().await.unwrap().unwrap();

        let token = sub.cancel_token();
        let waiter = tokio::spawn(async move { sub.next().await.is_none() });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        assert!(waiter.await.unwrap());
    }
}
