//! Server-Sent Events (SSE) utilities
//!
//! Bridges a live review [`Subscription`] onto an SSE response. The
//! subscription lives inside the response stream, so a client disconnect
//! drops it and releases its change receiver. Cancelling the shutdown
//! token ends every open stream, which lets graceful shutdown complete.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{sort_newest_first, Review};
use crate::store::Subscription;

/// SSE event name carrying a full review list
pub const SNAPSHOT_EVENT: &str = "ReviewSnapshot";
/// SSE event name carrying a transient subscription failure
pub const ERROR_EVENT: &str = "SubscriptionError";
/// User-visible text for a failed live read
pub const SUBSCRIPTION_ERROR_MESSAGE: &str = "Could not load new reviews.";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Payload of a `ReviewSnapshot` event
#[derive(Debug, Serialize)]
pub struct SnapshotPayload<'a> {
    pub reviews: &'a [Review],
}

/// Stream a live review subscription as SSE
///
/// Every snapshot is sorted newest first and reduced to its public form
/// before it is sent. Failed reads become `SubscriptionError` events and
/// the stream carries on.
pub fn create_review_sse_stream(
    service_name: &'static str,
    mut subscription: Subscription,
    shutdown: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} review feed", service_name);

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("SSE: {} review feed closed for shutdown", service_name);
                    break;
                }

                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                item = subscription.next() => {
                    match item {
                        Some(Ok(mut reviews)) => {
                            sort_newest_first(&mut reviews);
                            let reviews: Vec<Review> =
                                reviews.into_iter().map(Review::into_public).collect();
                            match serde_json::to_string(&SnapshotPayload { reviews: &reviews }) {
                                Ok(json) => {
                                    debug!("SSE: Sending snapshot of {} reviews", reviews.len());
                                    yield Ok(Event::default().event(SNAPSHOT_EVENT).data(json));
                                }
                                Err(e) => warn!("SSE: Failed to serialize snapshot: {}", e),
                            }
                        }
                        Some(Err(e)) => {
                            warn!("SSE: Live review read failed: {}", e);
                            yield Ok(Event::default()
                                .event(ERROR_EVENT)
                                .data(SUBSCRIPTION_ERROR_MESSAGE));
                        }
                        None => {
                            info!("SSE: {} review feed ended", service_name);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use axum::response::IntoResponse;
    use futures::stream;

    fn review(id: &str, user_id: &str) -> Review {
        Review {
            id: id.to_string(),
            book_id: "book-1".to_string(),
            rating: Default::default(),
            text: "fine".to_string(),
            created_at: None,
            user_id: user_id.to_string(),
        }
    }

    async fn body_text(
        sse: Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>,
    ) -> String {
        let body = sse.into_response().into_body();
        let bytes = tokio::time::timeout(
            Duration::from_secs(5),
            axum::body::to_bytes(body, usize::MAX),
        )
        .await
        .expect("stream should end")
        .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_read_failure_becomes_error_event_and_feed_continues() {
        let items = vec![
            Err(Error::Internal("disk gone".to_string())),
            Ok(vec![review("r1", "0123456789abcdef")]),
        ];
        let subscription = Subscription::new(Box::pin(stream::iter(items)));

        let text = body_text(create_review_sse_stream(
            "test",
            subscription,
            CancellationToken::new(),
        ))
        .await;

        let error_at = text.find("event: SubscriptionError").expect("error event sent");
        let snapshot_at = text.find("event: ReviewSnapshot").expect("snapshot still sent");
        assert!(error_at < snapshot_at);
        assert!(text.contains("data: Could not load new reviews."));
        assert!(!text.contains("disk gone"), "store error stays server-side");
    }

    #[tokio::test]
    async fn test_snapshot_carries_only_user_prefix() {
        let items = vec![Ok(vec![review("r1", "0123456789abcdef")])];
        let subscription = Subscription::new(Box::pin(stream::iter(items)));

        let text = body_text(create_review_sse_stream(
            "test",
            subscription,
            CancellationToken::new(),
        ))
        .await;

        assert!(text.contains(r#""userId":"01234567""#));
        assert!(!text.contains("0123456789abcdef"));
    }

    #[tokio::test]
    async fn test_cancelled_token_ends_idle_stream() {
        let shutdown = CancellationToken::new();
        let subscription =
            Subscription::new(Box::pin(stream::pending::<crate::Result<Vec<Review>>>()));
        let sse = create_review_sse_stream("test", subscription, shutdown.clone());

        shutdown.cancel();
        let text = body_text(sse).await;
        assert!(!text.contains("ReviewSnapshot"));
    }
}
