//! In-process expiring backend.
//!
//! Mirrors the Redis primitives the cache layer relies on, including SCAN
//! cursor semantics: a key that exists for the whole duration of a scan is
//! returned at least once, even when other keys are deleted between rounds.
//! Cursors are insertion sequence numbers, so deleting already-visited keys
//! never shifts unvisited ones.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use super::backend::{CacheBackend, ScanPage};
use super::clock::{Clock, SystemClock};
use super::config::Ttl;
use super::error::{BackendError, BackendOp};
use super::pattern::glob_match;

/// A stored value and its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, (u64, CacheEntry)>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl State {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((seq, _)) => {
                self.order.remove(&seq);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    get: AtomicU64,
    set: AtomicU64,
    delete: AtomicU64,
    scan: AtomicU64,
}

impl CallCounters {
    fn counter(&self, op: BackendOp) -> Option<&AtomicU64> {
        match op {
            BackendOp::Get => Some(&self.get),
            BackendOp::Set => Some(&self.set),
            BackendOp::Delete => Some(&self.delete),
            BackendOp::Scan => Some(&self.scan),
            BackendOp::Connect => None,
        }
    }
}

/// In-memory [`CacheBackend`] with an injectable clock and fault injection.
pub struct MemoryBackend {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
    failing: Mutex<HashSet<BackendOp>>,
    calls: CallCounters,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State {
                next_seq: 1,
                ..Default::default()
            }),
            clock,
            failing: Mutex::new(HashSet::new()),
            calls: CallCounters::default(),
        }
    }

    /// Make every subsequent call of `op` fail until [`recover`](Self::recover).
    pub fn fail_on(&self, op: BackendOp) {
        self.failing.lock().insert(op);
    }

    pub fn recover(&self, op: BackendOp) {
        self.failing.lock().remove(&op);
    }

    /// Number of times `op` was invoked, failed calls included.
    pub fn calls(&self, op: BackendOp) -> u64 {
        self.calls
            .counter(op)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Live (unexpired) entry for `key`.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        self.state
            .read()
            .entries
            .get(key)
            .map(|(_, entry)| entry)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry(key).is_some()
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .state
            .read()
            .entries
            .values()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(_, entry)| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin(&self, op: BackendOp) -> Result<(), BackendError> {
        if let Some(counter) = self.calls.counter(op) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        if self.failing.lock().contains(&op) {
            return Err(BackendError::Injected(op));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.state.read().entries.len())
            .finish()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.begin(BackendOp::Get)?;
        let now = self.clock.now();
        let mut state = self.state.write();

        let expired = match state.entries.get(key) {
            Some((_, entry)) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.remove(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Ttl) -> Result<(), BackendError> {
        self.begin(BackendOp::Set)?;
        let now = self.clock.now();
        let expires_at = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = CacheEntry {
            key: key.to_string(),
            value: value.to_vec(),
            expires_at,
        };

        let mut state = self.state.write();
        // Overwrites keep their sequence number so an in-flight scan still sees them.
        let seq = match state.entries.get(key) {
            Some((seq, _)) => *seq,
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                state.order.insert(seq, key.to_string());
                seq
            }
        };
        state.entries.insert(key.to_string(), (seq, entry));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, BackendError> {
        self.begin(BackendOp::Delete)?;
        let now = self.clock.now();
        let mut state = self.state.write();
        let mut removed = 0;
        for key in keys {
            let live = state
                .entries
                .get(key.as_str())
                .is_some_and(|(_, entry)| !entry.is_expired(now));
            if state.remove(key) && live {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, BackendError> {
        self.begin(BackendOp::Scan)?;
        let now = self.clock.now();
        let mut state = self.state.write();

        let window: Vec<(u64, String)> = state
            .order
            .range(cursor..)
            .take(count.max(1))
            .map(|(seq, key)| (*seq, key.clone()))
            .collect();

        let next = match window.last() {
            Some((last, _)) if state.order.range(last + 1..).next().is_some() => last + 1,
            _ => 0,
        };

        let mut keys = Vec::new();
        for (_, key) in window {
            let expired = state
                .entries
                .get(&key)
                .is_none_or(|(_, entry)| entry.is_expired(now));
            if expired {
                state.remove(&key);
            } else if glob_match(pattern.as_bytes(), key.as_bytes()) {
                keys.push(key);
            }
        }

        Ok(ScanPage { cursor: next, keys })
    }
}
