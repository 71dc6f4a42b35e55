//! catalog-cache - read-through Redis cache for a MongoDB media catalog.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `cache` - Key schema, fail-open store, read-through, invalidation
//! - `database` - MongoDB models and cached repositories
//! - `context` - Startup/shutdown owner of the shared state

pub mod cache;
pub mod config;
pub mod context;
pub mod database;

pub use cache::CacheManager;
pub use config::Config;
pub use context::AppContext;
