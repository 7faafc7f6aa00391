//! Page data loaders
//!
//! Pages are delivered as JSON props. Each loader produces a
//! [`PageOutcome`] carrying its own revalidation window, and
//! [`PageCache`] serves outcomes with stale-while-revalidate semantics.

use std::time::Duration;

pub mod book;
pub mod cache;
pub mod home;

pub use book::{load_book_page, BookPage};
pub use cache::PageCache;
pub use home::{load_home_page, HomePage};

/// Revalidation window for degraded and not-found outcomes
pub const DEGRADED_REVALIDATE: Duration = Duration::from_secs(10);

/// Result of rendering a page's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome<T> {
    Props { props: T, revalidate: Duration },
    NotFound,
    /// Rendered with an error message in place of data
    Degraded { error: String, revalidate: Duration },
}

impl<T> PageOutcome<T> {
    /// How long this outcome may be served before a re-render
    pub fn revalidate(&self) -> Duration {
        match self {
            PageOutcome::Props { revalidate, .. } | PageOutcome::Degraded { revalidate, .. } => {
                *revalidate
            }
            PageOutcome::NotFound => DEGRADED_REVALIDATE,
        }
    }
}
