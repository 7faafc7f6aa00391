//! HTTP API handlers for booknook-web

pub mod buildinfo;
pub mod config;
pub mod health;
pub mod pages;
pub mod reviews;
pub mod search;
pub mod session;

pub use buildinfo::get_build_info;
pub use config::get_public_config;
pub use health::health_routes;
pub use pages::{book_page, home_page};
pub use reviews::{create_review, list_reviews, live_reviews};
pub use search::search_books;
pub use session::{bearer_uid, create_session};
