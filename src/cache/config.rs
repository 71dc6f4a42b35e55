//! Cache configuration.

use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

use super::error::CacheError;
use super::keys::KeyFamily;

pub const DEFAULT_AGGREGATION_TTL_SECS: u64 = 600;
pub const DEFAULT_LIST_TTL_SECS: u64 = 300;
pub const DEFAULT_SINGLE_ITEM_TTL_SECS: u64 = 1800;
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;
pub const DEFAULT_MAX_SCAN_ITERATIONS: u32 = 10_000;
pub const DEFAULT_OP_TIMEOUT_MS: u64 = 500;

/// Time-to-live in whole seconds. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ttl(NonZeroU64);

impl Ttl {
    pub fn from_secs(secs: u64) -> Result<Self, CacheError> {
        NonZeroU64::new(secs)
            .map(Self)
            .ok_or(CacheError::InvalidTtl(secs))
    }

    pub fn as_secs(self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

const fn ttl(secs: u64) -> Ttl {
    match NonZeroU64::new(secs) {
        Some(secs) => Ttl(secs),
        None => panic!("default ttl must be positive"),
    }
}

const DEFAULT_AGGREGATION_TTL: Ttl = ttl(DEFAULT_AGGREGATION_TTL_SECS);
const DEFAULT_LIST_TTL: Ttl = ttl(DEFAULT_LIST_TTL_SECS);
const DEFAULT_SINGLE_ITEM_TTL: Ttl = ttl(DEFAULT_SINGLE_ITEM_TTL_SECS);

/// TTL policy and purge limits.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for `aggregation:*` and `<entity>:<metric>:<id>` keys.
    pub aggregation_ttl: Ttl,
    /// TTL for `list:<entity>` keys.
    pub list_ttl: Ttl,
    /// TTL for `<entity>:<id>` keys.
    pub single_item_ttl: Ttl,
    /// COUNT hint passed to every SCAN.
    pub scan_batch_size: usize,
    /// Hard ceiling on SCAN round trips for a single purge.
    pub max_scan_iterations: u32,
    /// Upper bound on any single backend round trip.
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            aggregation_ttl: DEFAULT_AGGREGATION_TTL,
            list_ttl: DEFAULT_LIST_TTL,
            single_item_ttl: DEFAULT_SINGLE_ITEM_TTL,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            max_scan_iterations: DEFAULT_MAX_SCAN_ITERATIONS,
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
        }
    }
}

impl CacheConfig {
    /// TTL applied by
    /// [`ReadThroughCache::resolve_with_policy`](super::ReadThroughCache::resolve_with_policy).
    ///
    /// Relation-derived views are list-shaped, so they share the list TTL.
    pub fn ttl_for(&self, family: KeyFamily) -> Ttl {
        match family {
            KeyFamily::Item => self.single_item_ttl,
            KeyFamily::List | KeyFamily::Relation => self.list_ttl,
            KeyFamily::Aggregation => self.aggregation_ttl,
        }
    }

    #[must_use]
    pub fn scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }

    #[must_use]
    pub fn max_scan_iterations(mut self, iterations: u32) -> Self {
        self.max_scan_iterations = iterations.max(1);
        self
    }

    #[must_use]
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.aggregation_ttl.as_secs(), 600);
        assert_eq!(config.list_ttl.as_secs(), 300);
        assert_eq!(config.single_item_ttl.as_secs(), 1800);
        assert_eq!(config.scan_batch_size, 100);
        assert_eq!(config.max_scan_iterations, 10_000);
    }

    #[test]
    fn ttl_policy_by_family() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_for(KeyFamily::Item).as_secs(), 1800);
        assert_eq!(config.ttl_for(KeyFamily::List).as_secs(), 300);
        assert_eq!(config.ttl_for(KeyFamily::Relation).as_secs(), 300);
        assert_eq!(config.ttl_for(KeyFamily::Aggregation).as_secs(), 600);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        assert!(matches!(Ttl::from_secs(0), Err(CacheError::InvalidTtl(0))));
        assert_eq!(Ttl::from_secs(5).unwrap().as_duration(), Duration::from_secs(5));
    }

    #[test]
    fn builders_clamp_to_one() {
        let config = CacheConfig::default().scan_batch_size(0).max_scan_iterations(0);
        assert_eq!(config.scan_batch_size, 1);
        assert_eq!(config.max_scan_iterations, 1);
    }
}
