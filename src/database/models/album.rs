//! Album record.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Owner of the album.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    pub album_name: String,
    pub artist_name: String,
    pub release_year: i32,
    #[serde(rename = "song_IDs", default)]
    pub song_ids: Vec<ObjectId>,
    #[serde(default)]
    pub song_names: Vec<String>,
}

impl Album {
    pub fn new(
        album_name: impl Into<String>,
        artist_name: impl Into<String>,
        release_year: i32,
    ) -> Self {
        Self {
            id: None,
            user_id: None,
            album_name: album_name.into(),
            artist_name: artist_name.into(),
            release_year,
            song_ids: Vec::new(),
            song_names: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AlbumUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(rename = "song_IDs", skip_serializing_if = "Option::is_none")]
    pub song_ids: Option<Vec<ObjectId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_names: Option<Vec<String>>,
}
