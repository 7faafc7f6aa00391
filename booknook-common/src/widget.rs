//! Review panel model
//!
//! UI-agnostic state behind a book's review panel:
//! - resolves an anonymous session once, on mount
//! - keeps a live subscription to the book's reviews and replaces the
//!   displayed list wholesale on every snapshot
//! - owns the submission form and validates it before any write
//!
//! Renderers read [`WidgetView`] snapshots and await [`ReviewWidget::wait_until`]
//! or [`ReviewWidget::changed`] for updates. After [`ReviewWidget::unmount`]
//! no task touches the state again, including submissions still in flight.

use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::identity::{ensure_anonymous_session, IdentityProvider, IdentityState};
use crate::models::{sort_newest_first, NewReview, Rating, Review};
use crate::sse::SUBSCRIPTION_ERROR_MESSAGE;
use crate::store::{subscribe_reviews, CollectionPath, StoreHandle};

pub const SIGN_IN_ERROR_MESSAGE: &str = "Could not sign in to review.";
pub const POST_ERROR_MESSAGE: &str = "Could not post review.";

/// Why a submission was not written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("You must be signed in to leave a review.")]
    NotSignedIn,

    #[error("Review text cannot be empty.")]
    EmptyText,

    /// The store rejected the write; carries the underlying cause for logs
    #[error("Could not post review.")]
    Write(String),
}

/// Draft review being edited
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReviewForm {
    pub rating: Rating,
    pub text: String,
}

/// Everything a renderer needs to draw the panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub book_id: String,
    /// Newest first, pending writes leading
    pub reviews: Vec<Review>,
    /// True until the first snapshot (or failure) for the current book
    pub loading: bool,
    /// Most recent user-visible message
    pub error: Option<String>,
    pub form: ReviewForm,
    pub identity: IdentityState,
    pub mounted: bool,
    /// Bumped on book change; drops snapshots from superseded feeds
    generation: u64,
}

impl WidgetView {
    pub fn can_submit(&self) -> bool {
        self.identity.session().is_some()
    }

    pub fn submit_label(&self) -> &'static str {
        if self.can_submit() {
            "Submit Review"
        } else {
            "Loading User..."
        }
    }

    /// Placeholder line shown instead of an empty list
    pub fn empty_message(&self) -> Option<&'static str> {
        match (self.reviews.is_empty(), self.loading) {
            (false, _) => None,
            (true, true) => Some("Loading reviews..."),
            (true, false) => Some("Be the first to write a review!"),
        }
    }
}

/// Collaborators a widget is mounted with
#[derive(Clone)]
pub struct WidgetContext {
    pub store: StoreHandle,
    pub identity: Arc<dyn IdentityProvider>,
    pub collection: CollectionPath,
}

struct Shared {
    view: Mutex<WidgetView>,
    version: watch::Sender<u64>,
}

impl Shared {
    /// Apply `f` while mounted; returns false when the update was dropped
    async fn update<F>(&self, generation: Option<u64>, f: F) -> bool
    where
        F: FnOnce(&mut WidgetView),
    {
        let mut view = self.view.lock().await;
        if !view.mounted {
            return false;
        }
        if let Some(generation) = generation {
            if generation != view.generation {
                return false;
            }
        }

        f(&mut view);
        drop(view);
        self.version.send_modify(|v| *v += 1);
        true
    }
}

struct FeedTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl FeedTask {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Live review panel for one book at a time
pub struct ReviewWidget {
    ctx: WidgetContext,
    shared: Arc<Shared>,
    feed: StdMutex<Option<FeedTask>>,
    identity_task: StdMutex<Option<JoinHandle<()>>>,
}

impl ReviewWidget {
    /// Mount the panel: show `initial_reviews`, resolve identity, go live
    pub fn mount(ctx: WidgetContext, book_id: impl Into<String>, initial_reviews: Vec<Review>) -> Self {
        let book_id = book_id.into();
        let mut reviews = initial_reviews;
        sort_newest_first(&mut reviews);

        let mut identity = IdentityState::default();
        identity.begin();

        let (version, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            view: Mutex::new(WidgetView {
                book_id: book_id.clone(),
                reviews,
                loading: true,
                error: None,
                form: ReviewForm::default(),
                identity,
                mounted: true,
                generation: 0,
            }),
            version,
        });

        let widget = Self {
            ctx,
            shared,
            feed: StdMutex::new(None),
            identity_task: StdMutex::new(None),
        };

        widget.start_identity();
        widget.start_feed(book_id, 0);
        widget
    }

    fn start_identity(&self) {
        let shared = self.shared.clone();
        let provider = self.ctx.identity.clone();

        let handle = tokio::spawn(async move {
            let outcome = ensure_anonymous_session(provider.as_ref()).await;
            shared
                .update(None, |view| match outcome {
                    Ok(session) => {
                        view.identity.resolve(session);
                    }
                    Err(e) => {
                        warn!("Anonymous sign-in failed: {}", e);
                        view.identity.fail(e.to_string());
                        view.error = Some(SIGN_IN_ERROR_MESSAGE.to_string());
                    }
                })
                .await;
        });

        *lock(&self.identity_task) = Some(handle);
    }

    fn start_feed(&self, book_id: String, generation: u64) {
        let mut subscription = subscribe_reviews(
            self.ctx.store.clone(),
            self.ctx.collection.clone(),
            book_id.clone(),
        );
        let cancel = subscription.cancel_token();
        let shared = self.shared.clone();

        let handle = tokio::spawn(async move {
            while let Some(item) = subscription.next().await {
                let applied = shared
                    .update(Some(generation), |view| match item {
                        Ok(mut reviews) => {
                            sort_newest_first(&mut reviews);
                            view.reviews = reviews;
                            view.loading = false;
                        }
                        Err(e) => {
                            error!(book_id = %view.book_id, "Snapshot error: {}", e);
                            view.error = Some(SUBSCRIPTION_ERROR_MESSAGE.to_string());
                            view.loading = false;
                        }
                    })
                    .await;

                if !applied {
                    break;
                }
            }
            debug!(book_id = %book_id, "Review feed stopped");
        });

        let previous = lock(&self.feed).replace(FeedTask { cancel, handle });
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    /// Current state snapshot
    pub async fn view(&self) -> WidgetView {
        self.shared.view.lock().await.clone()
    }

    /// Number of state changes applied so far
    pub fn version(&self) -> u64 {
        *self.shared.version.borrow()
    }

    /// Wait for the next state change
    pub async fn changed(&self) {
        let mut rx = self.shared.version.subscribe();
        let _ = rx.changed().await;
    }

    /// Wait until `predicate` holds for the current state, returning that state
    pub async fn wait_until<F>(&self, predicate: F) -> WidgetView
    where
        F: Fn(&WidgetView) -> bool,
    {
        let mut rx = self.shared.version.subscribe();
        loop {
            let view = self.view().await;
            if predicate(&view) || rx.changed().await.is_err() {
                return view;
            }
        }
    }

    pub async fn set_rating(&self, rating: Rating) {
        self.shared.update(None, |view| view.form.rating = rating).await;
    }

    pub async fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.update(None, |view| view.form.text = text).await;
    }

    /// Validate and write the current form
    ///
    /// Validation failures never reach the store. On success the form
    /// resets; on a write failure it is left intact for a retry.
    pub async fn submit(&self) -> Result<String, SubmitError> {
        let (session, form, book_id) = {
            let view = self.shared.view.lock().await;
            (
                view.identity.session().cloned(),
                view.form.clone(),
                view.book_id.clone(),
            )
        };

        let Some(session) = session else {
            self.report(SubmitError::NotSignedIn.to_string()).await;
            return Err(SubmitError::NotSignedIn);
        };

        if form.text.trim().is_empty() {
            self.report(SubmitError::EmptyText.to_string()).await;
            return Err(SubmitError::EmptyText);
        }

        let review = NewReview {
            book_id,
            user_id: session.uid,
            rating: form.rating,
            text: form.text,
        };

        match self.ctx.store.add_review(&self.ctx.collection, review).await {
            Ok(id) => {
                self.shared
                    .update(None, |view| {
                        view.form = ReviewForm::default();
                        view.error = None;
                    })
                    .await;
                Ok(id)
            }
            Err(e) => {
                error!("Error adding review: {}", e);
                self.report(POST_ERROR_MESSAGE.to_string()).await;
                Err(SubmitError::Write(e.to_string()))
            }
        }
    }

    async fn report(&self, message: String) {
        self.shared.update(None, |view| view.error = Some(message)).await;
    }

    /// Point the panel at another book
    ///
    /// The old subscription is cancelled before the new one opens; late
    /// snapshots from the old feed are discarded.
    pub async fn change_book(&self, book_id: impl Into<String>) {
        let book_id = book_id.into();
        let mut generation = None;

        self.shared
            .update(None, |view| {
                if view.book_id != book_id {
                    view.generation += 1;
                    view.book_id = book_id.clone();
                    view.reviews.clear();
                    view.loading = true;
                    generation = Some(view.generation);
                }
            })
            .await;

        if let Some(generation) = generation {
            self.start_feed(book_id, generation);
        }
    }

    /// Tear down the subscription; no state changes after this returns
    pub async fn unmount(&self) {
        self.shared.view.lock().await.mounted = false;
        self.stop_tasks();
        debug!("Review widget unmounted");
    }

    fn stop_tasks(&self) {
        if let Some(feed) = lock(&self.feed).take() {
            feed.stop();
        }
        if let Some(task) = lock(&self.identity_task).take() {
            task.abort();
        }
    }
}

impl Drop for ReviewWidget {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
