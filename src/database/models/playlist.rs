//! Playlist record.
//!
//! Song details are denormalised into parallel arrays, as stored.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    #[serde(rename = "playlistname")]
    pub name: String,
    #[serde(default)]
    pub song_count: u32,
    #[serde(rename = "song_ID", default)]
    pub song_ids: Vec<ObjectId>,
    #[serde(rename = "song_name", default)]
    pub song_names: Vec<String>,
    #[serde(rename = "song_duration", default)]
    pub song_durations: Vec<u32>,
    #[serde(rename = "artist_name", default)]
    pub artist_names: Vec<String>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id: None,
            name: name.into(),
            song_count: 0,
            song_ids: Vec::new(),
            song_names: Vec::new(),
            song_durations: Vec::new(),
            artist_names: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlaylistUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    #[serde(rename = "playlistname", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_count: Option<u32>,
    #[serde(rename = "song_ID", skip_serializing_if = "Option::is_none")]
    pub song_ids: Option<Vec<ObjectId>>,
    #[serde(rename = "song_name", skip_serializing_if = "Option::is_none")]
    pub song_names: Option<Vec<String>>,
    #[serde(rename = "song_duration", skip_serializing_if = "Option::is_none")]
    pub song_durations: Option<Vec<u32>>,
    #[serde(rename = "artist_name", skip_serializing_if = "Option::is_none")]
    pub artist_names: Option<Vec<String>>,
}
