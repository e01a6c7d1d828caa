//! In-process TTL cache for upstream responses.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// Keyed cache whose entries expire after a fixed TTL.
///
/// No lock is held while a value is being fetched, so concurrent misses on
/// the same key each fetch and the last writer wins.
#[derive(Clone)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fresh value for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        let age = entry.stored_at.elapsed();
        if age > self.ttl {
            return None;
        }
        tracing::debug!("Using cached data for {} (age: {}s)", key, age.as_secs());
        Some(entry.value.clone())
    }

    pub async fn insert(&self, key: &str, value: V) {
        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    ///
    /// Errors are returned as-is and never cached.
    pub async fn get_or_fetch<E, F, Fut>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        tracing::debug!("Refreshing cached data for {}", key);
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }
}
