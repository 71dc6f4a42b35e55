//! Cache key definitions.
//!
//! Every key starts with its view family and entity kind, so two distinct
//! views can never render to the same string. Rendering is pure: the same
//! input always produces the same key, across restarts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::CacheError;

/// Separator between key segments.
pub const DELIMITER: char = ':';

/// Leading segment of unfiltered list keys.
pub const LIST_NAMESPACE: &str = "list";
/// Leading segment of collection-wide aggregation keys.
pub const AGGREGATION_NAMESPACE: &str = "aggregation";
/// Leading segment of artist grouping keys.
pub const ARTISTS_NAMESPACE: &str = "artists";

/// `aggregation:artists` - songs grouped by artist.
pub const ARTISTS_AGGREGATION: &str = "artists";
/// `album:song_count:<id>`
pub const SONG_COUNT_METRIC: &str = "song_count";
/// `playlist:aggregation:<id>`
pub const PLAYLIST_AGGREGATION_METRIC: &str = "aggregation";
/// `playlist:songs:<id>`
pub const SONGS_RELATION: &str = "songs";

/// Catalog entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Song,
    Album,
    Playlist,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Song, Self::Album, Self::Playlist, Self::User];

    /// Singular name, used as the leading segment of item keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Album => "album",
            Self::Playlist => "playlist",
            Self::User => "user",
        }
    }

    /// Plural name, used in list keys and as the MongoDB collection name.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Song => "songs",
            Self::Album => "albums",
            Self::Playlist => "playlists",
            Self::User => "users",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered || kind.collection() == lowered)
            .ok_or_else(|| CacheError::UnknownEntityKind(s.to_string()))
    }
}

/// The four key families. Each value shape belongs to exactly one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// `<entity>:<id>`
    Item,
    /// `list:<entity>`
    List,
    /// `aggregation:<name>` or `<entity>:<metric>:<id>`
    Aggregation,
    /// `<entity>:<relation>:<id>`
    Relation,
}

/// A fully rendered-able cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Item { kind: EntityKind, id: String },
    List(EntityKind),
    Aggregation(&'static str),
    Metric {
        kind: EntityKind,
        metric: &'static str,
        id: String,
    },
    Relation {
        kind: EntityKind,
        relation: &'static str,
        id: String,
    },
}

impl CacheKey {
    /// `<entity>:<id>`
    pub fn item(kind: EntityKind, id: &str) -> Result<Self, CacheError> {
        validate_id(kind, id)?;
        Ok(Self::Item {
            kind,
            id: id.to_string(),
        })
    }

    /// `list:<entities>`
    pub fn list(kind: EntityKind) -> Self {
        Self::List(kind)
    }

    /// `aggregation:<name>`
    pub fn aggregation(name: &'static str) -> Self {
        Self::Aggregation(name)
    }

    /// `<entity>:<metric>:<id>`
    pub fn metric(kind: EntityKind, metric: &'static str, id: &str) -> Result<Self, CacheError> {
        validate_id(kind, id)?;
        Ok(Self::Metric {
            kind,
            metric,
            id: id.to_string(),
        })
    }

    /// `<entity>:<relation>:<id>`
    pub fn relation(
        kind: EntityKind,
        relation: &'static str,
        id: &str,
    ) -> Result<Self, CacheError> {
        validate_id(kind, id)?;
        Ok(Self::Relation {
            kind,
            relation,
            id: id.to_string(),
        })
    }

    pub fn artists_aggregation() -> Self {
        Self::aggregation(ARTISTS_AGGREGATION)
    }

    pub fn album_song_count(album_id: &str) -> Result<Self, CacheError> {
        Self::metric(EntityKind::Album, SONG_COUNT_METRIC, album_id)
    }

    pub fn playlist_songs(playlist_id: &str) -> Result<Self, CacheError> {
        Self::relation(EntityKind::Playlist, SONGS_RELATION, playlist_id)
    }

    pub fn playlist_aggregation(playlist_id: &str) -> Result<Self, CacheError> {
        Self::metric(EntityKind::Playlist, PLAYLIST_AGGREGATION_METRIC, playlist_id)
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Item { .. } => KeyFamily::Item,
            Self::List(_) => KeyFamily::List,
            Self::Aggregation(_) | Self::Metric { .. } => KeyFamily::Aggregation,
            Self::Relation { .. } => KeyFamily::Relation,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const D: char = DELIMITER;
        match self {
            Self::Item { kind, id } => write!(f, "{kind}{D}{id}"),
            Self::List(kind) => write!(f, "{LIST_NAMESPACE}{D}{}", kind.collection()),
            Self::Aggregation(name) => write!(f, "{AGGREGATION_NAMESPACE}{D}{name}"),
            Self::Metric { kind, metric, id } => write!(f, "{kind}{D}{metric}{D}{id}"),
            Self::Relation { kind, relation, id } => write!(f, "{kind}{D}{relation}{D}{id}"),
        }
    }
}

/// Characters that would let an id escape its segment or act as a glob.
const FORBIDDEN_ID_CHARS: &[char] = &[DELIMITER, '*', '?', '[', ']', '\\'];

fn validate_id(kind: EntityKind, id: &str) -> Result<(), CacheError> {
    let reason = if id.is_empty() {
        Some("id is empty")
    } else if id.contains(FORBIDDEN_ID_CHARS) {
        Some("id contains a key delimiter or glob metacharacter")
    } else if id.chars().any(char::is_control) {
        Some("id contains control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CacheError::InvalidId {
            kind: kind.as_str(),
            id: id.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
