//! SQLite-backed document store
//!
//! Documents are stored as JSON in a single `documents` table keyed by
//! collection path. Field filters use `json_extract`, so the table shape
//! does not depend on the document schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CollectionPath, DocumentStore};
use crate::events::{EventBus, StoreEvent};
use crate::models::{NewReview, Rating, Review, ANONYMOUS_USER};
use crate::Result;

/// Change notifications buffered per subscriber before it lags
const EVENT_CAPACITY: usize = 256;

/// Document store over a SQLite connection pool
pub struct SqliteDocumentStore {
    name: String,
    pool: SqlitePool,
    events: EventBus,
}

impl SqliteDocumentStore {
    /// Open (creating if needed) an on-disk store
    pub async fn open(db_path: &Path, name: &str) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new document store: {}", db_path.display());
        } else {
            info!("Opened existing document store: {}", db_path.display());
        }

        // WAL lets live-query readers proceed while a review is written
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        Self::with_pool(pool, name).await
    }

    /// Private in-memory store, used by tests and local development
    ///
    /// A single pooled connection that never expires keeps the database
    /// alive for the store's lifetime.
    pub async fn in_memory(name: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        debug!("Opened in-memory document store '{}'", name);
        Self::with_pool(pool, name).await
    }

    async fn with_pool(pool: SqlitePool, name: &str) -> Result<Self> {
        create_documents_table(&pool).await?;
        Ok(Self {
            name: name.to_string(),
            pool,
            events: EventBus::new(EVENT_CAPACITY),
        })
    }

    /// Undo an append whose timestamp could not be stamped
    ///
    /// `Err` from [`DocumentStore::add_review`] means nothing was stored,
    /// so a retry cannot duplicate the review. If the pending document
    /// cannot be removed either, it stays readable and the append counts
    /// as done.
    async fn withdraw_unstamped(
        &self,
        collection: &CollectionPath,
        book_id: &str,
        id: String,
        stamp_error: sqlx::Error,
    ) -> Result<String> {
        let removed = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(&id)
            .execute(&self.pool)
            .await;

        match removed {
            Ok(_) => {
                warn!(
                    review_id = %id,
                    "Review timestamp failed, append withdrawn: {}",
                    stamp_error
                );
                self.events.emit_lossy(StoreEvent::ReviewWithdrawn {
                    collection: collection.to_string(),
                    book_id: book_id.to_string(),
                    review_id: id,
                });
                Err(stamp_error.into())
            }
            Err(e) => {
                warn!(
                    review_id = %id,
                    "Review timestamp failed ({}) and withdrawal failed ({}); left pending",
                    stamp_error,
                    e
                );
                Ok(id)
            }
        }
    }

    /// Underlying pool, for diagnostics and tests
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_book
         ON documents (collection, json_extract(data, '$.bookId'))",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_review(&self, collection: &CollectionPath, review: NewReview) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let data = serde_json::to_string(&review)?;

        sqlx::query("INSERT INTO documents (id, collection, data, created_at) VALUES (?, ?, ?, NULL)")
            .bind(&id)
            .bind(collection.as_str())
            .bind(&data)
            .execute(&self.pool)
            .await?;

        self.events.emit_lossy(StoreEvent::ReviewAdded {
            collection: collection.to_string(),
            book_id: review.book_id.clone(),
            review_id: id.clone(),
        });

        let stamped_at = Utc::now();
        let stamped = sqlx::query("UPDATE documents SET created_at = ? WHERE id = ?")
            .bind(stamped_at)
            .bind(&id)
            .execute(&self.pool)
            .await;

        if let Err(stamp_error) = stamped {
            return self
                .withdraw_unstamped(collection, &review.book_id, id, stamp_error)
                .await;
        }

        self.events.emit_lossy(StoreEvent::ReviewTimestamped {
            collection: collection.to_string(),
            book_id: review.book_id.clone(),
            review_id: id.clone(),
        });

        debug!(review_id = %id, book_id = %review.book_id, "Review appended");
        Ok(id)
    }

    async fn reviews_for_book(
        &self,
        collection: &CollectionPath,
        book_id: &str,
    ) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            "SELECT id, data, created_at FROM documents
             WHERE collection = ? AND json_extract(data, '$.bookId') = ?
             ORDER BY rowid ASC",
        )
        .bind(collection.as_str())
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        let mut reviews = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let data: String = row.try_get("data")?;
            let created_at: Option<DateTime<Utc>> = row.try_get("created_at")?;
            reviews.push(decode_review(id, book_id, &data, created_at));
        }

        Ok(reviews)
    }

    fn changes(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    async fn close(&self) {
        info!("Closing document store '{}'", self.name);
        self.pool.close().await;
    }
}

/// Decode a stored document, substituting defaults for missing fields
///
/// Documents written by other clients may lack fields or carry an
/// out-of-range rating; neither should hide the rest of the list.
fn decode_review(
    id: String,
    book_id: &str,
    data: &str,
    created_at: Option<DateTime<Utc>>,
) -> Review {
    let doc: Value = serde_json::from_str(data).unwrap_or_else(|e| {
        warn!(review_id = %id, "Unreadable review document: {}", e);
        json!({})
    });

    let rating = doc
        .get("rating")
        .and_then(Value::as_i64)
        .and_then(|r| Rating::new(r).ok())
        .unwrap_or_default();

    Review {
        book_id: doc
            .get("bookId")
            .and_then(Value::as_str)
            .unwrap_or(book_id)
            .to_string(),
        rating,
        text: doc
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at,
        user_id: doc
            .get("userId")
            .and_then(Value::as_str)
            .unwrap_or(ANONYMOUS_USER)
            .to_string(),
        id,
    }
}
