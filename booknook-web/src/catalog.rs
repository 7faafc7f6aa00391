//! External book catalog client
//!
//! Typed client over the catalog's volume search and volume lookup
//! endpoints. Volumes are projected onto [`Book`] / [`BookSummary`] with
//! placeholders for any field the catalog leaves out.

use booknook_common::models::{
    PLACEHOLDER_AUTHOR, PLACEHOLDER_COVER_URL, PLACEHOLDER_DESCRIPTION, PLACEHOLDER_PURCHASE_URL,
    PLACEHOLDER_TITLE,
};
use booknook_common::{Book, BookSummary};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Results requested per search
pub const MAX_RESULTS: u32 = 18;

const USER_AGENT: &str = concat!("BookNook/", env!("CARGO_PKG_VERSION"));

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Catalog API error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Search response; `items` is absent when nothing matched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeList {
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub image_links: Option<ImageLinks>,
    pub description: Option<String>,
    pub info_link: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
}

impl VolumeInfo {
    fn title(&self) -> String {
        non_blank(self.title.as_deref()).unwrap_or(PLACEHOLDER_TITLE).to_string()
    }

    fn author(&self) -> String {
        match &self.authors {
            Some(authors) if !authors.is_empty() => authors.join(", "),
            _ => PLACEHOLDER_AUTHOR.to_string(),
        }
    }

    fn cover_url(&self) -> String {
        let thumbnail = self.image_links.as_ref().and_then(|l| l.thumbnail.as_deref());
        non_blank(thumbnail).unwrap_or(PLACEHOLDER_COVER_URL).to_string()
    }
}

impl From<Volume> for BookSummary {
    fn from(volume: Volume) -> Self {
        let info = &volume.volume_info;
        BookSummary {
            title: info.title(),
            author: info.author(),
            cover_url: info.cover_url(),
            id: volume.id,
        }
    }
}

impl From<Volume> for Book {
    fn from(volume: Volume) -> Self {
        let info = &volume.volume_info;
        Book {
            title: info.title(),
            author: info.author(),
            cover_url: info.cover_url(),
            description: non_blank(info.description.as_deref())
                .unwrap_or(PLACEHOLDER_DESCRIPTION)
                .to_string(),
            purchase_url: non_blank(info.info_link.as_deref())
                .unwrap_or(PLACEHOLDER_PURCHASE_URL)
                .to_string(),
            id: volume.id,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Catalog API client
pub struct CatalogClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, CatalogError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search volumes by free text, at most [`MAX_RESULTS`]
    pub async fn search(&self, query: &str) -> Result<Vec<BookSummary>, CatalogError> {
        let url = self.endpoint(&["volumes"])?;
        let max_results = MAX_RESULTS.to_string();

        debug!(query = %query, "Searching catalog");

        let response = self
            .http_client
            .get(url)
            .query(&[
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Catalog search failed: {}", body);
            return Err(CatalogError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let list: VolumeList = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        info!(query = %query, results = list.items.len(), "Catalog search complete");
        Ok(list.items.into_iter().map(BookSummary::from).collect())
    }

    /// Look up one volume
    ///
    /// A non-success status or an error-shaped body means the volume does
    /// not exist and yields `Ok(None)`.
    pub async fn volume(&self, id: &str) -> Result<Option<Book>, CatalogError> {
        let url = self.endpoint(&["volumes", id])?;

        debug!(volume_id = %id, "Looking up catalog volume");

        let response = self
            .http_client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(volume_id = %id, status = status.as_u16(), "Catalog volume not found");
            return Ok(None);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        if body.is_null() || body.get("error").is_some() {
            debug!(volume_id = %id, "Catalog returned an error body");
            return Ok(None);
        }

        let volume: Volume =
            serde_json::from_value(body).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Ok(Some(volume.into()))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CatalogError::Parse(format!("invalid catalog base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CatalogError::Parse("catalog base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_with_all_fields() {
        let volume: Volume = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "volumeInfo": {
                "title": "Dune",
                "authors": ["Frank Herbert", "Brian Herbert"],
                "imageLinks": { "thumbnail": "http://covers.example/dune.jpg" },
                "description": "Spice.",
                "infoLink": "https://books.example/dune"
            }
        }))
        .unwrap();

        let book = Book::from(volume);
        assert_eq!(book.id, "abc123");
        assert_eq!(book.author, "Frank Herbert, Brian Herbert");
        assert_eq!(book.cover_url, "http://covers.example/dune.jpg");
        assert_eq!(book.purchase_url, "https://books.example/dune");
    }

    #[test]
    fn test_volume_placeholders() {
        let volume: Volume = serde_json::from_value(serde_json::json!({ "id": "bare" })).unwrap();

        let book = Book::from(volume.clone());
        assert_eq!(book.title, PLACEHOLDER_TITLE);
        assert_eq!(book.author, PLACEHOLDER_AUTHOR);
        assert_eq!(book.cover_url, PLACEHOLDER_COVER_URL);
        assert_eq!(book.description, PLACEHOLDER_DESCRIPTION);
        assert_eq!(book.purchase_url, PLACEHOLDER_PURCHASE_URL);

        let summary = BookSummary::from(volume);
        assert_eq!(summary.id, "bare");
        assert_eq!(summary.title, PLACEHOLDER_TITLE);
    }

    #[test]
    fn test_missing_items_is_empty() {
        let list: VolumeList = serde_json::from_str(r#"{"kind":"books#volumes","totalItems":0}"#).unwrap();
        assert!(list.items.is_empty());
    }

    #[test]
    fn test_endpoint_escapes_id() {
        let client = CatalogClient::new("http://127.0.0.1:9/books/v1/", "k").unwrap();
        let url = client.endpoint(&["volumes", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9/books/v1/volumes/a%2Fb%20c");
    }
}
