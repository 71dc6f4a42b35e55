//! Playlist repository and its derived views.

use std::sync::Arc;

use mongodb::bson::oid::ObjectId;
use tracing::debug;

use super::catalog::{CatalogCollection, CatalogDocument};
use super::{RepositoryError, Result, parse_id};
use crate::cache::{CacheKey, CacheManager, EntityKind};
use crate::database::Database;
use crate::database::models::{Playlist, PlaylistSongs, PlaylistSummary, PlaylistUpdate};

impl CatalogDocument for Playlist {
    const KIND: EntityKind = EntityKind::Playlist;
    type Update = PlaylistUpdate;

    fn id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

#[derive(Clone)]
pub struct PlaylistRepository {
    playlists: CatalogCollection<Playlist>,
}

impl PlaylistRepository {
    pub fn new(db: &Database, cache: Arc<CacheManager>) -> Self {
        Self {
            playlists: CatalogCollection::new(db, cache),
        }
    }

    pub async fn list(&self) -> Result<Vec<Playlist>> {
        self.playlists.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Playlist> {
        self.playlists.get(id).await
    }

    pub async fn create(&self, playlist: Playlist) -> Result<Playlist> {
        self.playlists.create(playlist).await
    }

    pub async fn update(&self, id: &str, update: &PlaylistUpdate) -> Result<Playlist> {
        self.playlists.update(id, update).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.playlists.delete(id).await
    }

    /// Track list, cached at `playlist:songs:<id>`.
    pub async fn songs(&self, id: &str) -> Result<PlaylistSongs> {
        let oid = parse_id(EntityKind::Playlist, id)?;
        let playlist_id = oid.to_hex();
        let key = CacheKey::playlist_songs(&playlist_id)?;

        self.playlists
            .cache()
            .resolve_with_policy(&key, || async {
                let playlist = self.playlists.fetch(oid).await?;
                Ok::<_, RepositoryError>(PlaylistSongs::from_playlist(&playlist_id, &playlist))
            })
            .await
    }

    /// Totals, cached at `playlist:aggregation:<id>`.
    pub async fn summary(&self, id: &str) -> Result<PlaylistSummary> {
        let oid = parse_id(EntityKind::Playlist, id)?;
        let playlist_id = oid.to_hex();
        let key = CacheKey::playlist_aggregation(&playlist_id)?;

        self.playlists
            .cache()
            .resolve_with_policy(&key, || async {
                let playlist = self.playlists.fetch(oid).await?;
                let summary = PlaylistSummary::from_playlist(&playlist_id, &playlist);
                debug!(
                    playlist = %playlist_id,
                    songs = summary.song_count,
                    "Computed playlist summary"
                );
                Ok::<_, RepositoryError>(summary)
            })
            .await
    }
}
