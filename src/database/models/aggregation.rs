//! Derived views cached under the aggregation and relation key families.

use std::collections::BTreeSet;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::playlist::Playlist;

/// One song inside an artist grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtistSong {
    pub song_id: ObjectId,
    pub name: String,
    pub duration: u32,
    pub genre: String,
    #[serde(default)]
    pub album_name: Option<String>,
    pub release_year: i32,
}

/// Output row of the artists pipeline, cached at `aggregation:artists`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtistSongs {
    pub artist: String,
    pub songs: Vec<ArtistSong>,
}

/// Cached at `album:song_count:<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSongCount {
    pub album_id: String,
    pub song_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub song_id: ObjectId,
    pub name: String,
    pub duration: u32,
    pub artist: String,
}

/// Cached at `playlist:songs:<id>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSongs {
    pub playlist_id: String,
    pub songs: Vec<PlaylistTrack>,
}

impl PlaylistSongs {
    /// Zips the playlist's parallel song arrays. Missing trailing details
    /// (a shorter name or duration array) fall back to empty values.
    pub fn from_playlist(playlist_id: &str, playlist: &Playlist) -> Self {
        let songs = playlist
            .song_ids
            .iter()
            .enumerate()
            .map(|(i, song_id)| PlaylistTrack {
                song_id: *song_id,
                name: playlist.song_names.get(i).cloned().unwrap_or_default(),
                duration: playlist.song_durations.get(i).copied().unwrap_or_default(),
                artist: playlist.artist_names.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            playlist_id: playlist_id.to_string(),
            songs,
        }
    }
}

/// Cached at `playlist:aggregation:<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub playlist_id: String,
    pub name: String,
    pub song_count: u64,
    /// Seconds.
    pub total_duration: u64,
    /// Distinct artists, sorted.
    pub artists: Vec<String>,
}

impl PlaylistSummary {
    pub fn from_playlist(playlist_id: &str, playlist: &Playlist) -> Self {
        let artists: BTreeSet<&str> = playlist
            .artist_names
            .iter()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .collect();

        Self {
            playlist_id: playlist_id.to_string(),
            name: playlist.name.clone(),
            song_count: playlist.song_ids.len() as u64,
            total_duration: playlist.song_durations.iter().map(|&d| u64::from(d)).sum(),
            artists: artists.into_iter().map(str::to_string).collect(),
        }
    }
}
