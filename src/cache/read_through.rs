//! Get-or-compute over the fail-open store.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::config::{CacheConfig, Ttl};
use super::error::CacheError;
use super::keys::CacheKey;
use super::store::CacheStore;
use super::value::CacheValue;

/// Read path shared by every cached query.
///
/// There is no single-flight: concurrent misses on one key each run the
/// loader and each write the result, last writer wins.
#[derive(Debug, Clone)]
pub struct ReadThroughCache {
    store: Arc<CacheStore>,
    config: CacheConfig,
}

impl ReadThroughCache {
    pub fn new(store: Arc<CacheStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Return the cached value for `key`, or run `loader`, cache its result
    /// for `ttl` and return it.
    ///
    /// Loader errors propagate unchanged and nothing is cached. A backend
    /// fault or an undecodable entry counts as a miss.
    pub async fn resolve<V, F, Fut, E>(&self, key: &CacheKey, ttl: Ttl, loader: F) -> Result<V, E>
    where
        V: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        V::check_family(key)?;
        let rendered = key.to_string();

        if let Some(bytes) = self.store.get(&rendered).await {
            match V::decode(&bytes) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(key = %rendered, error = %err, "Undecodable cache entry, reloading");
                }
            }
        }

        let value = loader().await?;
        let encoded = value.encode(key)?;
        if !self.store.set_with_ttl(&rendered, &encoded, ttl).await {
            debug!(key = %rendered, "Loaded value not cached");
        }
        Ok(value)
    }

    /// [`resolve`](Self::resolve) with the TTL configured for the key's family.
    pub async fn resolve_with_policy<V, F, Fut, E>(&self, key: &CacheKey, loader: F) -> Result<V, E>
    where
        V: CacheValue,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError>,
    {
        let ttl = self.config.ttl_for(key.family());
        self.resolve(key, ttl, loader).await
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
