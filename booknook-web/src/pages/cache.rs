//! Page revalidation cache
//!
//! - the first request for a key renders inline
//! - an entry inside its revalidation window is served as-is
//! - a stale entry is served immediately while one background render
//!   replaces it; concurrent stale hits do not start another
//! - adding a key first drops expired "not found" and degraded entries,
//!   then the oldest entries while the cache is at capacity

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use super::PageOutcome;

/// Entry limit of a cache built with [`PageCache::new`]
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

struct Entry<T> {
    outcome: PageOutcome<T>,
    rendered_at: Instant,
    refreshing: bool,
}

impl<T> Entry<T> {
    fn new(outcome: PageOutcome<T>) -> Self {
        Self {
            outcome,
            rendered_at: Instant::now(),
            refreshing: false,
        }
    }

    fn is_fresh(&self) -> bool {
        self.rendered_at.elapsed() < self.outcome.revalidate()
    }

    /// Expired entry that would be rendered again anyway
    fn is_disposable(&self) -> bool {
        !self.refreshing
            && !self.is_fresh()
            && !matches!(self.outcome, PageOutcome::Props { .. })
    }
}

/// Rendered page outcomes keyed by path
#[derive(Clone)]
pub struct PageCache<T> {
    entries: Arc<RwLock<HashMap<String, Entry<T>>>>,
    max_entries: usize,
}

impl<T> Default for PageCache<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }
}

impl<T> PageCache<T> {
    /// Cache holding at most `max_entries` keys (minimum 1)
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }
}

impl<T> PageCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached outcome for `key`, rendering with `render` when needed
    pub async fn get_or_render<F, Fut>(&self, key: &str, render: F) -> PageOutcome<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = PageOutcome<T>> + Send + 'static,
    {
        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(key) {
                if entry.is_fresh() {
                    return entry.outcome.clone();
                }

                if !entry.refreshing {
                    entry.refreshing = true;
                    self.spawn_refresh(key.to_string(), render);
                }
                return entry.outcome.clone();
            }
        }

        debug!(key = %key, "Page not cached, rendering");
        let outcome = render().await;

        let mut entries = self.entries.write().await;
        if !entries.contains_key(key) {
            make_room(&mut entries, self.max_entries);
        }
        entries.insert(key.to_string(), Entry::new(outcome.clone()));
        outcome
    }

    fn spawn_refresh<F, Fut>(&self, key: String, render: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = PageOutcome<T>> + Send + 'static,
    {
        let entries = self.entries.clone();
        debug!(key = %key, "Page stale, revalidating in background");

        tokio::spawn(async move {
            let outcome = render().await;
            // An entry evicted mid-refresh stays evicted
            if let Some(entry) = entries.write().await.get_mut(&key) {
                *entry = Entry::new(outcome);
            }
        });
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Free a slot for one new key
fn make_room<T>(entries: &mut HashMap<String, Entry<T>>, max_entries: usize) {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_disposable());

    while entries.len() >= max_entries {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.rendered_at)
            .map(|(key, _)| key.clone());
        match oldest {
            Some(key) => {
                entries.remove(&key);
            }
            None => break,
        }
    }

    let evicted = before - entries.len();
    if evicted > 0 {
        debug!(evicted, remaining = entries.len(), "Page cache entries evicted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_render(
        renders: Arc<AtomicUsize>,
        revalidate: Duration,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = PageOutcome<usize>> + Send>> {
        move || {
            Box::pin(async move {
                let n = renders.fetch_add(1, Ordering::SeqCst) + 1;
                PageOutcome::Props {
                    props: n,
                    revalidate,
                }
            })
        }
    }

    fn props(outcome: PageOutcome<usize>) -> usize {
        match outcome {
            PageOutcome::Props { props, .. } => props,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_is_reused() {
        let cache = PageCache::new();
        let renders = Arc::new(AtomicUsize::new(0));
        let window = Duration::from_secs(60);

        assert_eq!(props(cache.get_or_render("/", counting_render(renders.clone(), window)).await), 1);
        assert_eq!(props(cache.get_or_render("/", counting_render(renders.clone(), window)).await), 1);
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_served_then_refreshed_once() {
        let cache = PageCache::new();
        let renders = Arc::new(AtomicUsize::new(0));
        let window = Duration::from_secs(60);

        cache.get_or_render("/book/x", counting_render(renders.clone(), window)).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        // Both stale hits get the old render; only one refresh starts
        let a = cache.get_or_render("/book/x", counting_render(renders.clone(), window)).await;
        let b = cache.get_or_render("/book/x", counting_render(renders.clone(), window)).await;
        assert_eq!(props(a), 1);
        assert_eq!(props(b), 1);

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(renders.load(Ordering::SeqCst), 2);
        let c = cache.get_or_render("/book/x", counting_render(renders.clone(), window)).await;
        assert_eq!(props(c), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_uses_short_window() {
        let cache: PageCache<usize> = PageCache::new();
        let renders = Arc::new(AtomicUsize::new(0));

        let render = |renders: Arc<AtomicUsize>| {
            move || async move {
                renders.fetch_add(1, Ordering::SeqCst);
                PageOutcome::NotFound
            }
        };

        cache.get_or_render("/book/missing", render(renders.clone())).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get_or_render("/book/missing", render(renders.clone())).await;
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        cache.get_or_render("/book/missing", render(renders.clone())).await;
        tokio::task::yield_now().await;
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_stay_within_capacity() {
        let cache = PageCache::with_capacity(50);
        let renders = Arc::new(AtomicUsize::new(0));
        let window = Duration::from_secs(60);

        for i in 0..200 {
            let key = format!("/book/junk-{}", i);
            cache.get_or_render(&key, counting_render(renders.clone(), window)).await;
            tokio::time::advance(Duration::from_millis(1)).await;
        }
        assert_eq!(cache.len().await, 50);

        // Newest entry survived; the oldest was evicted
        let newest = cache
            .get_or_render("/book/junk-199", counting_render(renders.clone(), window))
            .await;
        assert_eq!(props(newest), 200);
        cache.get_or_render("/book/junk-0", counting_render(renders.clone(), window)).await;
        assert_eq!(renders.load(Ordering::SeqCst), 201);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_not_found_entries_are_swept() {
        let cache: PageCache<usize> = PageCache::new();

        for i in 0..100 {
            let key = format!("/book/missing-{}", i);
            cache.get_or_render(&key, || async { PageOutcome::NotFound }).await;
        }
        assert_eq!(cache.len().await, 100);

        tokio::time::advance(Duration::from_secs(11)).await;
        let renders = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_render("/book/real", counting_render(renders, Duration::from_secs(60)))
            .await;
        assert_eq!(cache.len().await, 1);
    }
}
