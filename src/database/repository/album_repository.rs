//! Album repository.

use std::sync::Arc;

use mongodb::Collection;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Document, doc};

use super::catalog::{CatalogCollection, CatalogDocument};
use super::{RepositoryError, Result, parse_id};
use crate::cache::{CacheKey, CacheManager, EntityKind};
use crate::database::Database;
use crate::database::models::{Album, AlbumSongCount, AlbumUpdate};

impl CatalogDocument for Album {
    const KIND: EntityKind = EntityKind::Album;
    type Update = AlbumUpdate;

    fn id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

#[derive(Clone)]
pub struct AlbumRepository {
    albums: CatalogCollection<Album>,
    songs: Collection<Document>,
}

impl AlbumRepository {
    pub fn new(db: &Database, cache: Arc<CacheManager>) -> Self {
        Self {
            albums: CatalogCollection::new(db, cache),
            songs: db.collection(EntityKind::Song.collection()),
        }
    }

    pub async fn list(&self) -> Result<Vec<Album>> {
        self.albums.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Album> {
        self.albums.get(id).await
    }

    pub async fn create(&self, album: Album) -> Result<Album> {
        self.albums.create(album).await
    }

    pub async fn update(&self, id: &str, update: &AlbumUpdate) -> Result<Album> {
        self.albums.update(id, update).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.albums.delete(id).await
    }

    /// Songs whose `album_ID` points at this album, cached at
    /// `album:song_count:<id>`.
    pub async fn song_count(&self, id: &str) -> Result<AlbumSongCount> {
        let oid = parse_id(EntityKind::Album, id)?;
        let album_id = oid.to_hex();
        let key = CacheKey::album_song_count(&album_id)?;

        self.albums
            .cache()
            .resolve_with_policy(&key, || async {
                self.albums.fetch(oid).await?;
                let song_count = self.songs.count_documents(doc! { "album_ID": oid }).await?;
                Ok::<_, RepositoryError>(AlbumSongCount {
                    album_id: album_id.clone(),
                    song_count,
                })
            })
            .await
    }
}
