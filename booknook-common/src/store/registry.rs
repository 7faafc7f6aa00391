//! Process-wide registry of named store handles
//!
//! Mirrors the "initialized apps" list of hosted database SDKs. A second
//! registration under a taken name (a dev-server hot reload, or a racing
//! initializer elsewhere in the process) hands back the existing handle
//! instead of failing.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

use super::StoreHandle;

static REGISTRY: Lazy<Mutex<HashMap<String, StoreHandle>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Result of [`StoreRegistry::register`]
pub enum RegisterOutcome {
    /// The handle was stored under the name
    Registered(StoreHandle),
    /// The name was taken; carries the handle registered first
    AlreadyRegistered(StoreHandle),
}

impl RegisterOutcome {
    /// The handle now registered under the name, whichever call won
    pub fn into_handle(self) -> StoreHandle {
        match self {
            RegisterOutcome::Registered(handle) | RegisterOutcome::AlreadyRegistered(handle) => {
                handle
            }
        }
    }
}

pub struct StoreRegistry;

impl StoreRegistry {
    pub fn get(name: &str) -> Option<StoreHandle> {
        lock().get(name).cloned()
    }

    /// Register `handle` under `name` unless the name is taken (first writer wins)
    pub fn register(name: &str, handle: StoreHandle) -> RegisterOutcome {
        let mut apps = lock();
        match apps.get(name) {
            Some(existing) => RegisterOutcome::AlreadyRegistered(existing.clone()),
            None => {
                apps.insert(name.to_string(), handle.clone());
                RegisterOutcome::Registered(handle)
            }
        }
    }

    pub fn unregister(name: &str) -> Option<StoreHandle> {
        lock().remove(name)
    }

    pub fn registered_names() -> Vec<String> {
        lock().keys().cloned().collect()
    }
}

// The map stays consistent even if a holder panicked, so recover the guard
fn lock() -> std::sync::MutexGuard<'static, HashMap<String, StoreHandle>> {
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteDocumentStore;
    use std::sync::Arc;

    async fn handle(name: &str) -> StoreHandle {
        Arc::new(SqliteDocumentStore::in_memory(name).await.unwrap())
    }

    #[tokio::test]
    async fn test_first_registration_wins() {
        let name = format!("registry-{}", uuid::Uuid::new_v4());
        let first = handle(&name).await;
        let second = handle(&name).await;

        assert!(matches!(
            StoreRegistry::register(&name, first.clone()),
            RegisterOutcome::Registered(_)
        ));

        let outcome = StoreRegistry::register(&name, second.clone());
        assert!(matches!(outcome, RegisterOutcome::AlreadyRegistered(_)));
        let winner = outcome.into_handle();
        assert!(Arc::ptr_eq(&winner, &first));
        assert!(!Arc::ptr_eq(&winner, &second));

        assert!(StoreRegistry::registered_names().contains(&name));
        assert!(StoreRegistry::unregister(&name).is_some());
        assert!(StoreRegistry::get(&name).is_none());
    }
}
