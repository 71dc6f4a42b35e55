//! Bulk deletion of every key matching a glob.
//!
//! The purge is a small state machine driven by SCAN cursors: scan a page,
//! delete what it returned, repeat until the backend hands back cursor 0.
//! A hard iteration ceiling stops a backend that never terminates.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::error::CacheError;
use super::pattern::KeyPattern;
use super::store::CacheStore;

/// How a purge ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// The scan reached cursor 0.
    Completed,
    /// A scan or delete failed; keys may remain.
    BackendUnavailable,
    /// Gave up after `max_scan_iterations` pages.
    IterationCeiling,
}

impl PurgeOutcome {
    pub fn is_complete(self) -> bool {
        self == Self::Completed
    }
}

impl fmt::Display for PurgeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::BackendUnavailable => "backend unavailable",
            Self::IterationCeiling => "iteration ceiling reached",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub pattern: KeyPattern,
    /// SCAN round trips performed.
    pub batches: u32,
    pub deleted: u64,
    pub outcome: PurgeOutcome,
}

enum PurgeState {
    Scanning { cursor: u64 },
    Deleting { keys: Vec<String>, next: u64 },
    Done(PurgeOutcome),
}

/// Cursor-driven pattern purge over the fail-open store.
#[derive(Debug, Clone)]
pub struct PatternPurger {
    store: Arc<CacheStore>,
    batch_size: usize,
    max_iterations: u32,
}

impl PatternPurger {
    pub fn new(store: Arc<CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            batch_size: config.scan_batch_size.max(1),
            max_iterations: config.max_scan_iterations.max(1),
        }
    }

    /// Delete every key matching `pattern`. Never fails; see the report.
    pub async fn purge(&self, pattern: &KeyPattern) -> PurgeReport {
        let mut seen: HashSet<String> = HashSet::new();
        let mut batches = 0u32;
        let mut deleted = 0u64;
        let mut state = PurgeState::Scanning { cursor: 0 };

        let outcome = loop {
            state = match state {
                PurgeState::Scanning { .. } if batches >= self.max_iterations => {
                    warn!(%pattern, batches, "Purge stopped at iteration ceiling");
                    PurgeState::Done(PurgeOutcome::IterationCeiling)
                }
                PurgeState::Scanning { cursor } => {
                    batches += 1;
                    match self.store.scan(cursor, pattern, self.batch_size).await {
                        Some(page) => {
                            let keys: Vec<String> = page
                                .keys
                                .into_iter()
                                .filter(|key| seen.insert(key.clone()))
                                .collect();
                            PurgeState::Deleting {
                                keys,
                                next: page.cursor,
                            }
                        }
                        None => PurgeState::Done(PurgeOutcome::BackendUnavailable),
                    }
                }
                PurgeState::Deleting { keys, next } => {
                    match self.store.delete(&keys).await {
                        Some(removed) => {
                            deleted += removed;
                            if next == 0 {
                                PurgeState::Done(PurgeOutcome::Completed)
                            } else {
                                PurgeState::Scanning { cursor: next }
                            }
                        }
                        None => PurgeState::Done(PurgeOutcome::BackendUnavailable),
                    }
                }
                PurgeState::Done(outcome) => break outcome,
            };
        };

        if deleted > 0 {
            info!(%pattern, deleted, batches, %outcome, "Purged cache keys");
        } else {
            debug!(%pattern, batches, %outcome, "Purge matched nothing");
        }

        PurgeReport {
            pattern: pattern.clone(),
            batches,
            deleted,
            outcome,
        }
    }

    /// Count keys matching `pattern` without deleting them. `None` if the
    /// scan failed or hit the ceiling.
    pub async fn count(&self, pattern: &KeyPattern) -> Option<u64> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor = 0;
        for _ in 0..self.max_iterations {
            let page = self.store.scan(cursor, pattern, self.batch_size).await?;
            seen.extend(page.keys);
            if page.cursor == 0 {
                return Some(seen.len() as u64);
            }
            cursor = page.cursor;
        }
        warn!(%pattern, "Key count stopped at iteration ceiling");
        None
    }

    /// Parse `pattern` and purge it.
    pub async fn purge_str(&self, pattern: &str) -> Result<PurgeReport, CacheError> {
        let pattern = KeyPattern::parse(pattern)?;
        Ok(self.purge(&pattern).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::backend::{CacheBackend, ScanPage};
    use crate::cache::config::Ttl;
    use crate::cache::error::{BackendError, BackendOp};
    use crate::cache::memory::MemoryBackend;

    fn purger_over(backend: Arc<dyn CacheBackend>, batch: usize) -> PatternPurger {
        let store = Arc::new(CacheStore::new(backend));
        PatternPurger::new(store, &CacheConfig::default().scan_batch_size(batch))
    }

    async fn seed(backend: &MemoryBackend, keys: impl IntoIterator<Item = String>) {
        let ttl = Ttl::from_secs(300).unwrap();
        for key in keys {
            backend.set_ex(&key, b"1", ttl).await.unwrap();
        }
    }

    #[tokio::test]
    async fn zero_matches_is_a_completed_no_op() {
        let backend = Arc::new(MemoryBackend::new());
        seed(&backend, ["song:1".to_string()]).await;
        let purger = purger_over(backend.clone(), 100);

        let report = purger.purge_str("playlist:*").await.unwrap();

        assert_eq!(report.outcome, PurgeOutcome::Completed);
        assert_eq!(report.deleted, 0);
        assert_eq!(backend.calls(BackendOp::Delete), 0);
        assert!(backend.contains("song:1"));
    }

    #[tokio::test]
    async fn deletes_every_match_across_batches() {
        let backend = Arc::new(MemoryBackend::new());
        seed(&backend, (0..250).map(|i| format!("album:song_count:{i}"))).await;
        seed(&backend, (0..20).map(|i| format!("album:{i}"))).await;
        let purger = purger_over(backend.clone(), 100);

        let report = purger.purge_str("album:song_count:*").await.unwrap();

        assert_eq!(report.outcome, PurgeOutcome::Completed);
        assert_eq!(report.deleted, 250);
        assert!(report.batches >= 3);
        assert_eq!(backend.len(), 20);
        assert!(backend.keys().iter().all(|k| !k.starts_with("album:song_count:")));
    }

    /// Returns the same key forever and never reaches cursor 0.
    #[derive(Default)]
    struct EndlessScan {
        deletes: AtomicU64,
    }

    #[async_trait]
    impl CacheBackend for EndlessScan {
        fn name(&self) -> &'static str {
            "endless"
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
            Ok(None)
        }

        async fn set_ex(&self, _key: &str, _value: &[u8], _ttl: Ttl) -> Result<(), BackendError> {
            Ok(())
        }

        async fn delete(&self, keys: &[String]) -> Result<u64, BackendError> {
            self.deletes.fetch_add(keys.len() as u64, Ordering::SeqCst);
            Ok(keys.len() as u64)
        }

        async fn scan(
            &self,
            cursor: u64,
            _pattern: &str,
            _count: usize,
        ) -> Result<ScanPage, BackendError> {
            Ok(ScanPage {
                cursor: cursor + 1,
                keys: vec!["playlist:stuck".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn ceiling_stops_a_scan_that_never_ends() {
        let backend = Arc::new(EndlessScan::default());
        let store = Arc::new(CacheStore::new(backend.clone()));
        let purger = PatternPurger::new(store, &CacheConfig::default().max_scan_iterations(5));

        let report = purger.purge_str("playlist:*").await.unwrap();

        assert_eq!(report.outcome, PurgeOutcome::IterationCeiling);
        assert_eq!(report.batches, 5);
        // the repeated key is deleted once
        assert_eq!(report.deleted, 1);
        assert_eq!(backend.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scan_failure_ends_the_purge() {
        let backend = Arc::new(MemoryBackend::new());
        seed(&backend, ["playlist:1".to_string()]).await;
        backend.fail_on(BackendOp::Scan);
        let purger = purger_over(backend.clone(), 100);

        let report = purger.purge_str("playlist:*").await.unwrap();

        assert_eq!(report.outcome, PurgeOutcome::BackendUnavailable);
        assert!(backend.contains("playlist:1"));
    }

    #[tokio::test]
    async fn count_leaves_keys_in_place() {
        let backend = Arc::new(MemoryBackend::new());
        seed(&backend, (0..30).map(|i| format!("artists:{i}"))).await;
        seed(&backend, ["list:songs".to_string()]).await;
        let purger = purger_over(backend.clone(), 7);

        let pattern = KeyPattern::parse("artists:*").unwrap();
        assert_eq!(purger.count(&pattern).await, Some(30));
        assert_eq!(backend.len(), 31);
    }

    #[tokio::test]
    async fn malformed_pattern_is_rejected() {
        let purger = purger_over(Arc::new(MemoryBackend::new()), 100);
        assert!(matches!(
            purger.purge_str("playlist:[abc").await,
            Err(CacheError::MalformedPattern { .. })
        ));
    }
}
