//! Book detail page data
//!
//! Combines a catalog volume with a one-shot snapshot of its reviews.
//! Catalog "not found" yields [`PageOutcome::NotFound`]; every other
//! failure yields a degraded page that re-renders after a short window.

use booknook_common::store::SharedConnection;
use booknook_common::{sort_newest_first, Book, CollectionPath, Review};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use super::{PageOutcome, DEGRADED_REVALIDATE};
use crate::catalog::CatalogClient;
use crate::error::ApiError;

/// Revalidation window for a rendered book page
pub const BOOK_REVALIDATE: Duration = Duration::from_secs(60);
/// Error shown in place of a book page that could not be built
pub const BOOK_LOAD_ERROR: &str = "Failed to load book data.";

/// Props of the book detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPage {
    pub book: Book,
    /// Newest first, as of render time
    pub static_reviews: Vec<Review>,
}

/// Load the book page for catalog volume `id`
pub async fn load_book_page(
    catalog: &CatalogClient,
    connection: &SharedConnection,
    collection: &CollectionPath,
    id: &str,
) -> PageOutcome<BookPage> {
    match fetch_book_page(catalog, connection, collection, id).await {
        Ok(Some(props)) => PageOutcome::Props {
            props,
            revalidate: BOOK_REVALIDATE,
        },
        Ok(None) => {
            debug!(book_id = %id, "Book not found in catalog");
            PageOutcome::NotFound
        }
        Err(e) => {
            error!(book_id = %id, "Error loading book page: {}", e);
            PageOutcome::Degraded {
                error: BOOK_LOAD_ERROR.to_string(),
                revalidate: DEGRADED_REVALIDATE,
            }
        }
    }
}

async fn fetch_book_page(
    catalog: &CatalogClient,
    connection: &SharedConnection,
    collection: &CollectionPath,
    id: &str,
) -> Result<Option<BookPage>, ApiError> {
    let Some(book) = catalog.volume(id).await? else {
        return Ok(None);
    };

    let store = connection.get_shared_connection().await?;
    let mut static_reviews = store.reviews_for_book(collection, id).await?;
    sort_newest_first(&mut static_reviews);

    debug!(book_id = %id, reviews = static_reviews.len(), "Book page rendered");
    Ok(Some(BookPage {
        book,
        static_reviews: static_reviews.into_iter().map(Review::into_public).collect(),
    }))
}
