//! Fail-open adapter over a [`CacheBackend`].
//!
//! Nothing here returns an error. A backend fault is logged and the call
//! behaves as if it never happened: reads miss, writes and deletes become
//! no-ops, scans end. A store without a backend (cache disabled) does the
//! same without logging.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use super::backend::{CacheBackend, ScanPage};
use super::config::Ttl;
use super::pattern::KeyPattern;

/// Point-in-time copy of the store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deleted: u64,
    pub backend_errors: u64,
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deleted: AtomicU64,
    backend_errors: AtomicU64,
}

impl CacheStats {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }
}

/// The cache layer's only door to the backend.
pub struct CacheStore {
    backend: Option<Arc<dyn CacheBackend>>,
    stats: CacheStats,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
            stats: CacheStats::default(),
        }
    }

    /// A store with no backend: every read misses, every write is dropped.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            stats: CacheStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("disabled", |b| b.name())
    }

    /// Raw bytes for `key`, or `None` on miss or backend failure.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let backend = self.backend.as_ref()?;
        match backend.get(key).await {
            Ok(Some(value)) => {
                CacheStats::bump(&self.stats.hits, 1);
                debug!(key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                CacheStats::bump(&self.stats.misses, 1);
                debug!(key, "Cache miss");
                None
            }
            Err(err) => {
                CacheStats::bump(&self.stats.misses, 1);
                CacheStats::bump(&self.stats.backend_errors, 1);
                warn!(
                    key,
                    backend = backend.name(),
                    error = %err,
                    "Cache get failed, treating as miss"
                );
                None
            }
        }
    }

    /// Whole-value write with expiry. Returns whether the backend accepted it.
    pub async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Ttl) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            return false;
        };
        match backend.set_ex(key, value, ttl).await {
            Ok(()) => {
                CacheStats::bump(&self.stats.sets, 1);
                debug!(key, %ttl, bytes = value.len(), "Cache set");
                true
            }
            Err(err) => {
                CacheStats::bump(&self.stats.backend_errors, 1);
                warn!(key, backend = backend.name(), error = %err, "Cache set failed");
                false
            }
        }
    }

    /// Delete keys. Returns how many were removed, or `None` if the backend
    /// failed (or there is no backend).
    pub async fn delete(&self, keys: &[String]) -> Option<u64> {
        let backend = self.backend.as_ref()?;
        if keys.is_empty() {
            return Some(0);
        }
        match backend.delete(keys).await {
            Ok(removed) => {
                CacheStats::bump(&self.stats.deleted, removed);
                debug!(count = keys.len(), removed, "Cache delete");
                Some(removed)
            }
            Err(err) => {
                CacheStats::bump(&self.stats.backend_errors, 1);
                warn!(keys = ?keys, backend = backend.name(), error = %err, "Cache delete failed");
                None
            }
        }
    }

    /// One SCAN round trip, or `None` if the backend failed.
    pub async fn scan(&self, cursor: u64, pattern: &KeyPattern, count: usize) -> Option<ScanPage> {
        let backend = self.backend.as_ref()?;
        match backend.scan(cursor, pattern.as_str(), count).await {
            Ok(page) => Some(page),
            Err(err) => {
                CacheStats::bump(&self.stats.backend_errors, 1);
                warn!(
                    %pattern,
                    cursor,
                    backend = backend.name(),
                    error = %err,
                    "Cache scan failed"
                );
                None
            }
        }
    }

    /// Release the backend connection.
    pub async fn shutdown(&self) {
        if let Some(backend) = &self.backend {
            backend.close().await;
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("backend", &self.backend_name())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::error::BackendOp;
    use crate::cache::memory::MemoryBackend;

    fn store() -> (Arc<MemoryBackend>, CacheStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = CacheStore::new(backend.clone());
        (backend, store)
    }

    fn ttl() -> Ttl {
        Ttl::from_secs(60).unwrap()
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let (_, store) = store();
        assert!(store.set_with_ttl("song:1", b"{}", ttl()).await);
        assert_eq!(store.get("song:1").await, Some(b"{}".to_vec()));

        let stats = store.stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn get_failure_is_a_miss() {
        let (backend, store) = store();
        store.set_with_ttl("song:1", b"{}", ttl()).await;
        backend.fail_on(BackendOp::Get);

        assert_eq!(store.get("song:1").await, None);
        assert_eq!(store.stats().backend_errors, 1);
    }

    #[tokio::test]
    async fn write_failures_are_silent() {
        let (backend, store) = store();
        backend.fail_on(BackendOp::Set);
        backend.fail_on(BackendOp::Delete);
        backend.fail_on(BackendOp::Scan);

        assert!(!store.set_with_ttl("song:1", b"{}", ttl()).await);
        assert_eq!(store.delete(&["song:1".to_string()]).await, None);
        let pattern = KeyPattern::parse("song:*").unwrap();
        assert!(store.scan(0, &pattern, 10).await.is_none());
        assert_eq!(store.stats().backend_errors, 3);
    }

    #[tokio::test]
    async fn disabled_store_is_a_no_op() {
        let store = CacheStore::disabled();
        assert!(!store.is_enabled());
        assert!(!store.set_with_ttl("song:1", b"{}", ttl()).await);
        assert_eq!(store.get("song:1").await, None);
        assert_eq!(store.delete(&["song:1".to_string()]).await, None);
        store.shutdown().await;
    }

    #[tokio::test]
    async fn empty_delete_skips_backend() {
        let (backend, store) = store();
        assert_eq!(store.delete(&[]).await, Some(0));
        assert_eq!(backend.calls(BackendOp::Delete), 0);
    }
}
