//! Shared application state.
//!
//! Built once at startup and handed to whatever serves requests. Owns the
//! cache manager and, when configured, the MongoDB connection.

use std::sync::Arc;

use anyhow::{Context as _, bail};
use tracing::info;

use crate::cache::CacheManager;
use crate::config::Config;
use crate::database::{
    AlbumRepository, Database, PlaylistRepository, SongRepository, UserRepository,
};

/// Catalog repositories, all sharing one cache manager.
#[derive(Clone)]
pub struct Catalog {
    pub songs: Arc<SongRepository>,
    pub albums: Arc<AlbumRepository>,
    pub playlists: Arc<PlaylistRepository>,
    pub users: Arc<UserRepository>,
}

impl Catalog {
    pub fn new(db: &Database, cache: Arc<CacheManager>) -> Self {
        Self {
            songs: Arc::new(SongRepository::new(db, cache.clone())),
            albums: Arc::new(AlbumRepository::new(db, cache.clone())),
            playlists: Arc::new(PlaylistRepository::new(db, cache.clone())),
            users: Arc::new(UserRepository::new(db, cache)),
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub cache: Arc<CacheManager>,
    db: Option<Arc<Database>>,
    catalog: Option<Catalog>,
}

impl AppContext {
    pub fn new(config: Config, cache: Arc<CacheManager>, db: Option<Arc<Database>>) -> Self {
        let catalog = db.as_deref().map(|db| Catalog::new(db, cache.clone()));
        Self {
            config: Arc::new(config),
            cache,
            db,
            catalog,
        }
    }

    /// Build the cache manager and connect to MongoDB if `MONGODB_URI` is set.
    /// Redis is connected lazily, so an unreachable cache does not fail here.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let cache = CacheManager::from_settings(&config).context("invalid cache backend settings")?;
        let cache = Arc::new(cache);
        info!(
            backend = cache.backend_name(),
            address = %config.redis.address,
            "Cache manager ready"
        );

        let db = match &config.mongodb_uri {
            Some(uri) => {
                info!("Connecting to MongoDB...");
                let db = Database::connect(uri, &config.mongodb_database).await?;
                Some(Arc::new(db))
            }
            None => {
                info!("MONGODB_URI not set, running without the primary store");
                None
            }
        };

        Ok(Self::new(config, cache, db))
    }

    pub fn db(&self) -> Option<&Database> {
        self.db.as_deref()
    }

    /// Catalog repositories; fails when no primary store is configured.
    pub fn catalog(&self) -> anyhow::Result<&Catalog> {
        match &self.catalog {
            Some(catalog) => Ok(catalog),
            None => bail!("catalog repositories need MONGODB_URI"),
        }
    }

    pub async fn shutdown(&self) {
        self.cache.shutdown().await;
        if let Some(db) = &self.db {
            db.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, MemoryBackend};

    fn config() -> Config {
        Config::from_lookup(|_| None).unwrap()
    }

    #[tokio::test]
    async fn without_mongo_only_the_cache_is_available() {
        let cache = Arc::new(CacheManager::new(
            CacheConfig::default(),
            Arc::new(MemoryBackend::new()),
        ));
        let ctx = AppContext::new(config(), cache, None);

        assert!(ctx.db().is_none());
        assert!(ctx.catalog().is_err());
        assert_eq!(ctx.cache.backend_name(), "memory");
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn start_without_mongo_uri_succeeds() {
        let ctx = AppContext::start(config()).await.unwrap();
        assert!(ctx.db().is_none());
        assert_eq!(ctx.cache.backend_name(), "redis");
    }
}
