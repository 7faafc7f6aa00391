//! Shared document store connection
//!
//! One [`SharedConnection`] is built during process startup and handed to
//! request handlers through application state. Construction of the
//! underlying store happens at most once:
//! - concurrent first callers wait on a single initializer
//! - no caller ever observes a half-built handle
//! - a failed construction is not cached; the next call retries
//!
//! Construction reads privileged secrets from the environment and fails
//! fast, naming the first one missing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::registry::{RegisterOutcome, StoreRegistry};
use super::{SqliteDocumentStore, StoreHandle};
use crate::config::StoreCredentials;
use crate::{Error, Result};

/// Builds a store handle; invoked by [`SharedConnection`] at most once per success
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<StoreHandle>;
}

/// Lazily constructed, process-shared store handle
pub struct SharedConnection {
    connector: Box<dyn Connector>,
    cell: OnceCell<StoreHandle>,
    attempts: AtomicUsize,
}

impl SharedConnection {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            cell: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Ready-to-use store handle, constructing it on first use
    pub async fn get_shared_connection(&self) -> Result<StoreHandle> {
        if let Some(handle) = self.cell.get() {
            return Ok(handle.clone());
        }

        self.cell
            .get_or_try_init(|| async {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                info!(attempt, "Initializing shared document store connection");

                self.connector.connect().await.map_err(|e| {
                    error!(attempt, "Document store initialization failed: {}", e);
                    e
                })
            })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of construction attempts so far, successful or not
    pub fn init_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Close the store and drop its registration
    ///
    /// Only meant for process shutdown; the cell is not reset, so later
    /// calls would get a closed handle.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.cell.get() {
            handle.close().await;
            StoreRegistry::unregister(handle.name());
        }
    }
}

type SecretLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Connector for the SQLite document store
///
/// The store is named after the credentials' project id, which also names
/// the database file inside the data directory.
pub struct SqliteConnector {
    data_dir: Option<PathBuf>,
    lookup: SecretLookup,
}

impl SqliteConnector {
    /// On-disk store under `data_dir`, secrets from the process environment
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir: Some(data_dir),
            lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// In-memory store, secrets from the process environment
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            lookup: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the secret source
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Arc::new(lookup);
        self
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self) -> Result<StoreHandle> {
        let lookup: &(dyn Fn(&str) -> Option<String> + Send + Sync) = &*self.lookup;
        StoreCredentials::log_presence(lookup);
        let credentials = StoreCredentials::from_lookup(lookup)?;
        let name = credentials.project_id.clone();

        if !is_safe_name(&name) {
            return Err(Error::Config(format!(
                "{} may only contain letters, digits, '-' and '_'",
                crate::config::ENV_STORE_PROJECT_ID
            )));
        }

        if let Some(existing) = StoreRegistry::get(&name) {
            info!(project_id = %name, "Document store already registered, reusing it");
            return Ok(existing);
        }

        let store = match &self.data_dir {
            Some(dir) => SqliteDocumentStore::open(&dir.join(format!("{}.db", name)), &name).await?,
            None => SqliteDocumentStore::in_memory(&name).await?,
        };
        info!(
            project_id = %name,
            client_email = %credentials.client_email,
            "Document store initialized"
        );

        match StoreRegistry::register(&name, Arc::new(store)) {
            RegisterOutcome::Registered(handle) => Ok(handle),
            RegisterOutcome::AlreadyRegistered(existing) => {
                info!(project_id = %name, "Lost registration race, using existing store");
                Ok(existing)
            }
        }
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_name() {
        assert!(is_safe_name("book-nook_2"));
        assert!(!is_safe_name("../etc"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("a b"));
    }
}
