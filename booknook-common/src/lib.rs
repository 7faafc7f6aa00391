//! # Book Nook Common Library
//!
//! Shared code for the Book Nook service including:
//! - Review and book data model, newest-first ordering
//! - Document store access, live subscriptions, shared connection
//! - Anonymous identity
//! - Review panel state model
//! - Configuration loading and secret resolution
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod models;
pub mod sse;
pub mod store;
pub mod widget;

pub use error::{Error, Result};
pub use models::{sort_newest_first, Book, BookSummary, NewReview, Rating, Review};
pub use store::{CollectionPath, DocumentStore, SharedConnection, StoreHandle};
