//! Home page data: a featured selection from the catalog

use booknook_common::BookSummary;
use serde::Serialize;
use std::time::Duration;
use tracing::error;

use super::PageOutcome;
use crate::catalog::CatalogClient;

/// Catalog query behind the featured selection
pub const FEATURED_QUERY: &str = "new york times bestsellers fiction";
/// Revalidation window for the home page
pub const HOME_REVALIDATE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomePage {
    pub featured_books: Vec<BookSummary>,
}

/// Load the home page; a catalog failure leaves the featured list empty
pub async fn load_home_page(catalog: &CatalogClient) -> PageOutcome<HomePage> {
    let featured_books = match catalog.search(FEATURED_QUERY).await {
        Ok(books) => books,
        Err(e) => {
            error!("Error fetching featured books: {}", e);
            Vec::new()
        }
    };

    PageOutcome::Props {
        props: HomePage { featured_books },
        revalidate: HOME_REVALIDATE,
    }
}
