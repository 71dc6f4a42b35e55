//! The cache layer as one injectable value.

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use super::backend::CacheBackend;
use super::config::{CacheConfig, Ttl};
use super::error::{BackendError, CacheError};
use super::invalidation::{InvalidationReport, InvalidationRouter, MutationEvent};
use super::keys::CacheKey;
use super::pattern::KeyPattern;
use super::purger::{PatternPurger, PurgeReport};
use super::read_through::ReadThroughCache;
use super::redis_backend::RedisBackend;
use super::store::{CacheStatsSnapshot, CacheStore};
use super::value::CacheValue;
use crate::config::Config;

/// Owns the store and everything built on it. Shared as `Arc<CacheManager>`.
#[derive(Debug)]
pub struct CacheManager {
    store: Arc<CacheStore>,
    reader: ReadThroughCache,
    purger: PatternPurger,
    router: InvalidationRouter,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_store(config, CacheStore::new(backend))
    }

    /// Every read loads, every purge is a no-op.
    pub fn disabled(config: CacheConfig) -> Self {
        Self::with_store(config, CacheStore::disabled())
    }

    /// Build from application settings. The Redis connection is opened on
    /// first use, so this succeeds even when Redis is down.
    pub fn from_settings(settings: &Config) -> Result<Self, BackendError> {
        if !settings.cache_enabled {
            info!("Cache disabled by configuration");
            return Ok(Self::disabled(settings.cache.clone()));
        }

        let backend = RedisBackend::new(
            &settings.redis.url,
            settings.redis.address.clone(),
            settings.cache.op_timeout,
        )?;
        info!(address = backend.address(), "Cache backend configured");
        Ok(Self::new(settings.cache.clone(), Arc::new(backend)))
    }

    fn with_store(config: CacheConfig, store: CacheStore) -> Self {
        let store = Arc::new(store);
        let purger = PatternPurger::new(store.clone(), &config);
        Self {
            reader: ReadThroughCache::new(store.clone(), config),
            router: InvalidationRouter::new(store.clone(), purger.clone()),
            purger,
            store,
        }
    }

    pub async fn resolve<V, F, Fut, E>(&self, key: &CacheKey, ttl: Ttl, loader: F) -> Result<V, E>
    where
        V: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        self.reader.resolve(key, ttl, loader).await
    }

    pub async fn resolve_with_policy<V, F, Fut, E>(&self, key: &CacheKey, loader: F) -> Result<V, E>
    where
        V: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        self.reader.resolve_with_policy(key, loader).await
    }

    pub async fn invalidate(
        &self,
        event: &MutationEvent,
    ) -> Result<InvalidationReport, CacheError> {
        self.router.invalidate(event).await
    }

    pub async fn purge(&self, pattern: &KeyPattern) -> PurgeReport {
        self.purger.purge(pattern).await
    }

    /// Number of live keys matching `pattern`, or `None` if it could not be
    /// counted.
    pub async fn count(&self, pattern: &KeyPattern) -> Option<u64> {
        self.purger.count(pattern).await
    }

    /// Raw entry bytes, for inspection tooling.
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.store.get(key).await
    }

    pub fn config(&self) -> &CacheConfig {
        self.reader.config()
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_enabled()
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.store.stats()
    }

    pub async fn shutdown(&self) {
        self.store.shutdown().await;
        info!(stats = ?self.stats(), "Cache shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::error::BackendOp;
    use crate::cache::invalidation::MutationKind;
    use crate::cache::keys::EntityKind;
    use crate::cache::memory::MemoryBackend;
    use crate::database::models::User;

    #[derive(Debug, thiserror::Error)]
    #[error(transparent)]
    struct TestError(#[from] CacheError);

    fn user() -> User {
        User::new("freddie", "Freddie", "Mercury", "freddie@example.com")
    }

    #[tokio::test]
    async fn invalidate_drops_cached_read() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = CacheManager::new(CacheConfig::default(), backend.clone());
        let key = CacheKey::item(EntityKind::User, "U1").unwrap();

        let _: User = manager
            .resolve_with_policy(&key, || async { Ok::<_, TestError>(user()) })
            .await
            .unwrap();
        assert!(backend.contains("user:U1"));

        let event = MutationEvent::new(EntityKind::User, MutationKind::Update, "U1");
        let report = manager.invalidate(&event).await.unwrap();
        assert_eq!(report.deleted_total(), 1);
        assert!(!backend.contains("user:U1"));
    }

    #[tokio::test]
    async fn disabled_manager_always_loads() {
        let manager = CacheManager::disabled(CacheConfig::default());
        let key = CacheKey::item(EntityKind::User, "U1").unwrap();
        assert!(!manager.is_enabled());

        for _ in 0..2 {
            let loaded: User = manager
                .resolve_with_policy(&key, || async { Ok::<_, TestError>(user()) })
                .await
                .unwrap();
            assert_eq!(loaded, user());
        }
        assert_eq!(manager.peek("user:U1").await, None);
    }

    #[tokio::test]
    async fn outage_never_fails_reads() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_on(BackendOp::Get);
        backend.fail_on(BackendOp::Set);
        let manager = CacheManager::new(CacheConfig::default(), backend);
        let key = CacheKey::item(EntityKind::User, "U1").unwrap();

        let loaded: User = manager
            .resolve_with_policy(&key, || async { Ok::<_, TestError>(user()) })
            .await
            .unwrap();
        assert_eq!(loaded, user());
        assert_eq!(manager.stats().backend_errors, 2);
    }

    #[test]
    fn from_settings_does_not_connect() {
        let settings = Config::from_lookup(|name| match name {
            "REDIS_URL" => Some("redis://127.0.0.1:1/0".to_string()),
            _ => None,
        })
        .unwrap();
        let manager = CacheManager::from_settings(&settings).unwrap();
        assert_eq!(manager.backend_name(), "redis");
        assert!(manager.is_enabled());
    }
}
