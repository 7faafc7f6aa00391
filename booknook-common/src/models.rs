//! Data model shared by the store, the widget and the web service
//!
//! Reviews are the only entity this system owns. Books are read-only
//! projections of external catalog volumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::{Error, Result};

/// Cover shown when the catalog has no thumbnail for a volume
pub const PLACEHOLDER_COVER_URL: &str = "https://placehold.co/300x450?text=No+Cover";
pub const PLACEHOLDER_TITLE: &str = "Title not available";
pub const PLACEHOLDER_AUTHOR: &str = "Unknown";
pub const PLACEHOLDER_DESCRIPTION: &str = "No summary available.";
pub const PLACEHOLDER_PURCHASE_URL: &str = "#";

/// Attribution used when a stored review carries no user id
pub const ANONYMOUS_USER: &str = "Anonymous";

/// Star rating in the closed range 1..=5
///
/// Deserialization goes through [`Rating::new`], so an out-of-range value
/// can never be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(Error::InvalidInput(format!(
                "rating must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Filled and hollow stars, e.g. `★★★☆☆` for 3
    pub fn stars(self) -> String {
        let filled = self.0 as usize;
        let hollow = Self::MAX as usize - filled;
        format!("{}{}", "★".repeat(filled), "☆".repeat(hollow))
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl TryFrom<i64> for Rating {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A community review as read back from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub book_id: String,
    pub rating: Rating,
    pub text: String,
    /// `None` while the store has not yet stamped the write
    pub created_at: Option<DateTime<Utc>>,
    pub user_id: String,
}

impl Review {
    /// First 8 characters of the author's session id
    pub fn short_user_id(&self) -> &str {
        match self.user_id.char_indices().nth(8) {
            Some((idx, _)) => &self.user_id[..idx],
            None => &self.user_id,
        }
    }

    /// Long-form date such as "March 1, 2024", or "Just now" while pending
    pub fn display_date(&self) -> String {
        match self.created_at {
            Some(ts) => ts.format("%B %-d, %Y").to_string(),
            None => "Just now".to_string(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.created_at.is_none()
    }

    /// Copy fit for public payloads
    ///
    /// The full `userId` is the author's bearer credential; only its
    /// display prefix leaves the service.
    pub fn into_public(mut self) -> Self {
        let short = self.short_user_id().to_string();
        self.user_id = short;
        self
    }
}

/// Payload of a review append; the store assigns `id` and `createdAt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub book_id: String,
    pub user_id: String,
    pub rating: Rating,
    pub text: String,
}

impl NewReview {
    /// Build a submission, rejecting text that is empty after trimming
    ///
    /// The text is stored as entered; trimming only decides acceptance.
    pub fn new(
        book_id: impl Into<String>,
        user_id: impl Into<String>,
        rating: Rating,
        text: impl Into<String>,
    ) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Review text cannot be empty.".to_string()));
        }
        Ok(Self {
            book_id: book_id.into(),
            user_id: user_id.into(),
            rating,
            text,
        })
    }
}

/// Order reviews newest first
///
/// Pending reviews (no store timestamp yet) lead the list and compare equal
/// among themselves; the sort is stable so their relative order is kept.
pub fn sort_newest_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| compare_newest_first(a.created_at, b.created_at));
}

fn compare_newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => b.cmp(&a),
    }
}

/// Full detail projection of a catalog volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub cover_url: String,
    pub description: String,
    pub purchase_url: String,
}

/// Search result projection of a catalog volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub cover_url: String,
}

impl From<Book> for BookSummary {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            cover_url: book.cover_url,
        }
    }
}

/// Identity issued without credentials, used only to attribute writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousSession {
    pub uid: String,
    pub created_at: DateTime<Utc>,
}
