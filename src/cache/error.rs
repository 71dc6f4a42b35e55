//! Cache error types.
//!
//! `CacheError` covers caller mistakes and is always returned to the caller.
//! `BackendError` covers transient backend faults; the store logs it and folds
//! it into a miss or a no-op, so it never reaches business code.

use std::time::Duration;

use thiserror::Error;

use super::keys::KeyFamily;

/// Usage errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid {kind} id {id:?}: {reason}")]
    InvalidId {
        kind: &'static str,
        id: String,
        reason: &'static str,
    },

    #[error("malformed glob pattern {pattern:?}: {reason}")]
    MalformedPattern {
        pattern: String,
        reason: &'static str,
    },

    #[error("unknown entity kind {0:?}")]
    UnknownEntityKind(String),

    #[error("unknown mutation kind {0:?}")]
    UnknownMutationKind(String),

    #[error("key {key} belongs to the {actual:?} family, value shape expects {expected:?}")]
    FamilyMismatch {
        key: String,
        expected: KeyFamily,
        actual: KeyFamily,
    },

    #[error("value for {key} is not serializable")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("ttl must be a positive number of seconds, got {0}")]
    InvalidTtl(u64),
}

/// Backend operation, used for logging and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Get,
    Set,
    Delete,
    Scan,
    Connect,
}

impl BackendOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Delete => "delete",
            Self::Scan => "scan",
            Self::Connect => "connect",
        }
    }
}

impl std::fmt::Display for BackendOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient backend faults. Never surfaced past the store.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("{op} timed out after {after:?}")]
    Timeout { op: BackendOp, after: Duration },

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("injected failure on {0}")]
    Injected(BackendOp),
}
