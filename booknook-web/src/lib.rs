//! booknook-web library - Book Nook HTTP service
//!
//! Catalog search proxy, page props with revalidation, anonymous
//! sessions, and review endpoints (REST + SSE) over the shared document
//! store connection.

use axum::Router;
use booknook_common::identity::SessionRegistry;
use booknook_common::store::SharedConnection;
use booknook_common::CollectionPath;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod pages;

use catalog::CatalogClient;
use config::PublicConfig;
use pages::{BookPage, HomePage, PageCache};

/// Module name reported by health checks and logs
pub const MODULE_NAME: &str = "booknook-web";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Lazily constructed, process-shared document store
    pub connection: Arc<SharedConnection>,
    pub catalog: Arc<CatalogClient>,
    /// Issued anonymous sessions
    pub sessions: SessionRegistry,
    /// Reviews collection for the configured app id
    pub collection: CollectionPath,
    pub public_config: PublicConfig,
    pub book_pages: PageCache<BookPage>,
    pub home_page: PageCache<HomePage>,
    /// Cancelled when the server begins shutting down; ends live feeds
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create new application state
    pub fn new(
        connection: Arc<SharedConnection>,
        catalog: CatalogClient,
        public_config: PublicConfig,
    ) -> Self {
        Self {
            connection,
            catalog: Arc::new(catalog),
            sessions: SessionRegistry::new(),
            collection: CollectionPath::reviews(&public_config.app_id),
            public_config,
            book_pages: PageCache::new(),
            home_page: PageCache::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let pages = Router::new()
        .route("/", get(api::home_page))
        .route("/book/:id", get(api::book_page));

    let api = Router::new()
        .route("/api/search", get(api::search_books))
        .route("/api/session", post(api::create_session))
        .route(
            "/api/books/:id/reviews",
            get(api::list_reviews).post(api::create_review),
        )
        .route("/api/books/:id/reviews/live", get(api::live_reviews))
        .route("/api/config", get(api::get_public_config))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(pages)
        .merge(api)
        .with_state(state)
        .layer(CorsLayer::permissive())
}
