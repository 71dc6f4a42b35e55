//! Expiring key-value backend abstraction.

use async_trait::async_trait;

use super::config::Ttl;
use super::error::BackendError;

/// One SCAN round trip. `cursor == 0` means the iteration is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Primitives the cache layer needs from an expiring key-value store.
///
/// Implementations return errors freely; [`CacheStore`](super::CacheStore)
/// is responsible for turning them into misses and no-ops.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<(), BackendError>;

    /// Returns the number of keys that existed and were removed.
    async fn delete(&self, keys: &[String]) -> Result<u64, BackendError>;

    /// `SCAN cursor MATCH pattern COUNT count`.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
    -> Result<ScanPage, BackendError>;

    /// Release the connection. Later calls may reconnect lazily.
    async fn close(&self) {}
}
