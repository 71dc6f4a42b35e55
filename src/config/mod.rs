//! Configuration module for catalog-cache.
//!
//! Loads configuration from environment variables (and `.env`).

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::cache::{
    CacheConfig, DEFAULT_AGGREGATION_TTL_SECS, DEFAULT_LIST_TTL_SECS, DEFAULT_MAX_SCAN_ITERATIONS,
    DEFAULT_OP_TIMEOUT_MS, DEFAULT_SCAN_BATCH_SIZE, DEFAULT_SINGLE_ITEM_TTL_SECS, Ttl,
};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
pub const DEFAULT_MONGODB_DATABASE: &str = "spotify-clone";

const DEFAULT_REDIS_PORT: u16 = 6379;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("REDIS_URL is invalid: {0}")]
    RedisUrl(String),
}

/// Where the cache backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    /// Full connection string, possibly with credentials.
    pub url: String,
    /// `host:port/db`, safe to log.
    pub address: String,
    pub db: i64,
}

impl RedisSettings {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|e| ConfigError::RedisUrl(e.to_string()))?;
        if !matches!(url.scheme(), "redis" | "rediss") {
            return Err(ConfigError::RedisUrl(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::RedisUrl("missing host".to_string()))?;
        let port = url.port().unwrap_or(DEFAULT_REDIS_PORT);

        let db = match url.path().trim_start_matches('/') {
            "" => 0,
            path => path
                .parse::<i64>()
                .ok()
                .filter(|db| *db >= 0)
                .ok_or_else(|| ConfigError::RedisUrl(format!("invalid database {path:?}")))?,
        };

        Ok(Self {
            url: raw.to_string(),
            address: format!("{host}:{port}/{db}"),
            db,
        })
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Redis
    pub redis: RedisSettings,
    pub cache_enabled: bool,
    pub cache: CacheConfig,

    // MongoDB
    /// Optional: maintenance commands run without a primary store.
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
}

impl Config {
    /// Load configuration from the process environment, after `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value when set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let redis_url = var("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
        let redis = RedisSettings::parse(&redis_url)?;

        let cache_enabled = match var("CACHE_ENABLED") {
            Some(raw) => parse_bool("CACHE_ENABLED", &raw)?,
            None => true,
        };

        let cache = CacheConfig {
            aggregation_ttl: ttl_var(&var, "CACHE_TTL_AGGREGATION", DEFAULT_AGGREGATION_TTL_SECS)?,
            list_ttl: ttl_var(&var, "CACHE_TTL_LIST", DEFAULT_LIST_TTL_SECS)?,
            single_item_ttl: ttl_var(&var, "CACHE_TTL_SINGLE", DEFAULT_SINGLE_ITEM_TTL_SECS)?,
            scan_batch_size: positive_var(&var, "CACHE_SCAN_BATCH", DEFAULT_SCAN_BATCH_SIZE)?,
            max_scan_iterations: positive_var(
                &var,
                "CACHE_MAX_SCAN_ITERATIONS",
                DEFAULT_MAX_SCAN_ITERATIONS,
            )?,
            op_timeout: Duration::from_millis(positive_var(
                &var,
                "CACHE_OP_TIMEOUT_MS",
                DEFAULT_OP_TIMEOUT_MS,
            )?),
        };

        Ok(Self {
            redis,
            cache_enabled,
            cache,
            mongodb_uri: var("MONGODB_URI").or_else(|| var("MONGODB_URL")),
            mongodb_database: var("MONGODB_DATABASE")
                .or_else(|| var("DB_NAME"))
                .unwrap_or_else(|| DEFAULT_MONGODB_DATABASE.to_string()),
        })
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var: name,
            value: raw.to_string(),
            expected: "boolean",
        }),
    }
}

fn positive_var<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = var(name) else {
        return Ok(default);
    };
    raw.parse::<T>()
        .ok()
        .filter(|n| *n > T::default())
        .ok_or(ConfigError::Invalid {
            var: name,
            value: raw,
            expected: "positive integer",
        })
}

fn ttl_var(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Ttl, ConfigError> {
    let secs = positive_var(var, name, default)?;
    Ttl::from_secs(secs).map_err(|_| ConfigError::Invalid {
        var: name,
        value: secs.to_string(),
        expected: "ttl in seconds",
    })
}
