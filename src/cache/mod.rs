//! Cache module - Redis-backed read-through cache for the catalog.
//!
//! ## Architecture
//!
//! - `CacheKey` / `KeyPattern` - deterministic keys for the four key families
//!   (item, list, aggregation, relation) and the globs used to purge them
//! - `CacheStore` - fail-open adapter over a `CacheBackend` (Redis in
//!   production, `MemoryBackend` in tests)
//! - `ReadThroughCache` - get-or-load used by every read path
//! - `PatternPurger` - SCAN-driven bulk delete
//! - `InvalidationRouter` - maps one mutation to every key it may have staled
//! - `CacheManager` - owns all of the above, shared through `AppContext`
//!
//! ## Usage
//!
//! ```rust,ignore
//! let key = CacheKey::item(EntityKind::Song, &id)?;
//! let song: Song = cache.resolve_with_policy(&key, || load_song(&id)).await?;
//!
//! // after committing a write
//! cache.invalidate(&MutationEvent::updated(EntityKind::Song, &id)).await?;
//! ```

mod backend;
mod clock;
mod config;
mod error;
mod invalidation;
mod keys;
mod manager;
mod memory;
mod pattern;
mod purger;
mod read_through;
mod redis_backend;
mod store;
mod value;

pub use backend::{CacheBackend, ScanPage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CacheConfig, DEFAULT_AGGREGATION_TTL_SECS, DEFAULT_LIST_TTL_SECS, DEFAULT_MAX_SCAN_ITERATIONS,
    DEFAULT_OP_TIMEOUT_MS, DEFAULT_SCAN_BATCH_SIZE, DEFAULT_SINGLE_ITEM_TTL_SECS, Ttl,
};
pub use error::{BackendError, BackendOp, CacheError};
pub use invalidation::{
    InvalidationReport, InvalidationRouter, InvalidationRule, InvalidationTarget, MutationEvent,
    MutationKind, TargetReport,
};
pub use keys::{CacheKey, EntityKind, KeyFamily};
pub use manager::CacheManager;
pub use memory::{CacheEntry, MemoryBackend};
pub use pattern::KeyPattern;
pub use purger::{PatternPurger, PurgeOutcome, PurgeReport};
pub use read_through::ReadThroughCache;
pub use redis_backend::RedisBackend;
pub use store::{CacheStatsSnapshot, CacheStore};
pub use value::CacheValue;
