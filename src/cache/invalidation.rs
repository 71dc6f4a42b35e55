//! Mutation fan-out.
//!
//! One write to the catalog can stale many derived views. The table below
//! lists, per entity kind, every exact key and pattern that has to go:
//!
//! | Mutation on | Purges |
//! |---|---|
//! | song | `song:<id>`, `list:songs`, `aggregation:artists`, `album:song_count:*`, `playlist:*`, `artists:*` |
//! | album | `album:<id>`, `album:song_count:<id>`, `list:albums`, `artists:*` |
//! | playlist | `playlist:<id>`, `playlist:songs:<id>`, `playlist:aggregation:<id>`, `list:playlists` |
//! | user | `user:<id>`, `list:users` |
//!
//! Targets are independent and best-effort; they run concurrently and a
//! failure on one never stops the others.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::CacheError;
use super::keys::{ARTISTS_NAMESPACE, CacheKey, EntityKind, SONG_COUNT_METRIC};
use super::pattern::KeyPattern;
use super::purger::{PatternPurger, PurgeOutcome};
use super::store::CacheStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "insert" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" | "remove" => Ok(Self::Delete),
            _ => Err(CacheError::UnknownMutationKind(s.to_string())),
        }
    }
}

/// A committed write to the primary store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub entity_kind: EntityKind,
    pub mutation_kind: MutationKind,
    pub entity_id: String,
}

impl MutationEvent {
    pub fn new(
        entity_kind: EntityKind,
        mutation_kind: MutationKind,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            entity_kind,
            mutation_kind,
            entity_id: entity_id.into(),
        }
    }

    pub fn created(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::new(kind, MutationKind::Create, id)
    }

    pub fn updated(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::new(kind, MutationKind::Update, id)
    }

    pub fn deleted(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::new(kind, MutationKind::Delete, id)
    }
}

impl fmt::Display for MutationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.mutation_kind, self.entity_kind, self.entity_id)
    }
}

/// One thing to purge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    Key(CacheKey),
    Pattern(KeyPattern),
}

impl fmt::Display for InvalidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => fmt::Display::fmt(key, f),
            Self::Pattern(pattern) => fmt::Display::fmt(pattern, f),
        }
    }
}

/// The fan-out table.
pub struct InvalidationRule;

impl InvalidationRule {
    /// Targets for `event`, in table order. The mutation kind does not change
    /// the set: creates, updates and deletes stale the same views.
    pub fn for_event(event: &MutationEvent) -> Result<Vec<InvalidationTarget>, CacheError> {
        use InvalidationTarget::{Key, Pattern};

        let id = event.entity_id.as_str();
        let kind = event.entity_kind;
        let own = Key(CacheKey::item(kind, id)?);
        let list = Key(CacheKey::list(kind));

        let song_counts = format!("{SONG_COUNT_METRIC}:*");

        let targets = match kind {
            EntityKind::Song => vec![
                own,
                list,
                Key(CacheKey::artists_aggregation()),
                Pattern(KeyPattern::new(EntityKind::Album.as_str(), &song_counts)?),
                Pattern(KeyPattern::entity(EntityKind::Playlist)),
                Pattern(KeyPattern::new(ARTISTS_NAMESPACE, "*")?),
            ],
            EntityKind::Album => vec![
                own,
                Key(CacheKey::album_song_count(id)?),
                list,
                Pattern(KeyPattern::new(ARTISTS_NAMESPACE, "*")?),
            ],
            EntityKind::Playlist => vec![
                own,
                Key(CacheKey::playlist_songs(id)?),
                Key(CacheKey::playlist_aggregation(id)?),
                list,
            ],
            EntityKind::User => vec![own, list],
        };
        Ok(targets)
    }
}

/// Result of purging one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: InvalidationTarget,
    pub deleted: u64,
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationReport {
    pub event: MutationEvent,
    pub targets: Vec<TargetReport>,
}

impl InvalidationReport {
    pub fn deleted_total(&self) -> u64 {
        self.targets.iter().map(|t| t.deleted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| !t.ok)
    }

    pub fn is_clean(&self) -> bool {
        self.targets.iter().all(|t| t.ok)
    }
}

/// Executes the fan-out table.
#[derive(Debug, Clone)]
pub struct InvalidationRouter {
    store: Arc<CacheStore>,
    purger: PatternPurger,
}

impl InvalidationRouter {
    pub fn new(store: Arc<CacheStore>, purger: PatternPurger) -> Self {
        Self { store, purger }
    }

    /// Purge every view `event` may have staled.
    ///
    /// Only a malformed event is an error. Backend failures are logged and
    /// show up as failed targets in the report. With the cache disabled there
    /// is nothing to purge and every target reports clean.
    pub async fn invalidate(
        &self,
        event: &MutationEvent,
    ) -> Result<InvalidationReport, CacheError> {
        let targets = InvalidationRule::for_event(event)?;
        if !self.store.is_enabled() {
            debug!(event = %event, "Cache disabled, skipping invalidation");
            let targets = targets
                .into_iter()
                .map(|target| TargetReport {
                    target,
                    deleted: 0,
                    ok: true,
                })
                .collect();
            return Ok(InvalidationReport {
                event: event.clone(),
                targets,
            });
        }

        let targets = join_all(targets.into_iter().map(|target| self.run(target))).await;

        let report = InvalidationReport {
            event: event.clone(),
            targets,
        };
        for failed in report.failures() {
            warn!(event = %event, target = %failed.target, "Invalidation target not purged");
        }
        info!(
            event = %event,
            targets = report.targets.len(),
            deleted = report.deleted_total(),
            "Cache invalidated"
        );
        Ok(report)
    }

    async fn run(&self, target: InvalidationTarget) -> TargetReport {
        match &target {
            InvalidationTarget::Key(key) => {
                let removed = self.store.delete(&[key.to_string()]).await;
                TargetReport {
                    deleted: removed.unwrap_or(0),
                    ok: removed.is_some(),
                    target,
                }
            }
            InvalidationTarget::Pattern(pattern) => {
                let purge = self.purger.purge(pattern).await;
                TargetReport {
                    deleted: purge.deleted,
                    ok: purge.outcome == PurgeOutcome::Completed,
                    target,
                }
            }
        }
    }
}
