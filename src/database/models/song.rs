//! Song record.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A single song document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub artist: String,
    pub genre: String,
    pub release_year: i32,
    /// Duration in seconds.
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
    #[serde(rename = "album_ID", default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,
    #[serde(rename = "playlist_ID", default, skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<ObjectId>,
}

impl Song {
    pub fn new(
        name: impl Into<String>,
        artist: impl Into<String>,
        genre: impl Into<String>,
        release_year: i32,
        duration: u32,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            artist: artist.into(),
            genre: genre.into(),
            release_year,
            duration,
            album_name: None,
            album_id: None,
            playlist_name: None,
            playlist_id: None,
        }
    }
}

/// Partial update; only `Some` fields are written.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SongUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
    #[serde(rename = "album_ID", skip_serializing_if = "Option::is_none")]
    pub album_id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,
    #[serde(rename = "playlist_ID", skip_serializing_if = "Option::is_none")]
    pub playlist_id: Option<ObjectId>,
}
