//! Song repository, plus the artists aggregation.

use std::sync::Arc;

use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Document, doc};
use tracing::debug;

use super::catalog::{CatalogCollection, CatalogDocument};
use super::{RepositoryError, Result};
use crate::cache::{CacheKey, CacheManager, EntityKind};
use crate::database::Database;
use crate::database::models::{ArtistSongs, Song, SongUpdate};

impl CatalogDocument for Song {
    const KIND: EntityKind = EntityKind::Song;
    type Update = SongUpdate;

    fn id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

#[derive(Clone)]
pub struct SongRepository {
    songs: CatalogCollection<Song>,
}

impl SongRepository {
    pub fn new(db: &Database, cache: Arc<CacheManager>) -> Self {
        Self {
            songs: CatalogCollection::new(db, cache),
        }
    }

    pub async fn list(&self) -> Result<Vec<Song>> {
        self.songs.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Song> {
        self.songs.get(id).await
    }

    pub async fn create(&self, song: Song) -> Result<Song> {
        self.songs.create(song).await
    }

    pub async fn update(&self, id: &str, update: &SongUpdate) -> Result<Song> {
        self.songs.update(id, update).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.songs.delete(id).await
    }

    /// Songs grouped by artist, cached at `aggregation:artists`.
    pub async fn artists(&self) -> Result<Vec<ArtistSongs>> {
        let key = CacheKey::artists_aggregation();
        self.songs
            .cache()
            .resolve_with_policy(&key, || async {
                let cursor = self
                    .songs
                    .collection()
                    .aggregate(artists_pipeline())
                    .with_type::<ArtistSongs>()
                    .await?;
                let groups: Vec<ArtistSongs> = cursor.try_collect().await?;
                debug!(artists = groups.len(), "Computed artists aggregation");
                Ok::<_, RepositoryError>(groups)
            })
            .await
    }
}

/// Group every song under its artist, artists in name order.
pub fn artists_pipeline() -> Vec<Document> {
    vec![
        doc! { "$sort": { "artist": 1, "name": 1 } },
        doc! {
            "$group": {
                "_id": "$artist",
                "songs": {
                    "$push": {
                        "song_id": "$_id",
                        "name": "$name",
                        "duration": "$duration",
                        "genre": "$genre",
                        "album_name": "$album_name",
                        "release_year": "$release_year",
                    }
                }
            }
        },
        doc! { "$project": { "_id": 0, "artist": "$_id", "songs": 1 } },
        doc! { "$sort": { "artist": 1 } },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_groups_by_artist() {
        let pipeline = artists_pipeline();
        let stages: Vec<&str> = pipeline
            .iter()
            .filter_map(|stage| stage.keys().next().map(String::as_str))
            .collect();
        assert_eq!(stages, ["$sort", "$group", "$project", "$sort"]);

        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(group.get_str("_id").unwrap(), "$artist");
    }

    #[test]
    fn pipeline_output_deserializes() {
        let row = doc! {
            "artist": "Queen",
            "songs": [{
                "song_id": ObjectId::new(),
                "name": "Bohemian Rhapsody",
                "duration": 354,
                "genre": "Rock",
                "album_name": "A Night at the Opera",
                "release_year": 1975,
            }],
        };
        let parsed: ArtistSongs = mongodb::bson::from_document(row).unwrap();
        assert_eq!(parsed.artist, "Queen");
        assert_eq!(parsed.songs[0].duration, 354);
    }
}
