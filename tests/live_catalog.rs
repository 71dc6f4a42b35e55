//! Live repository tests against a running MongoDB.
//!
//! - Checks that writes commit first and then purge the cached views.
//! - Marked `#[ignore]`; run with `MONGODB_URI` set (or `.env`) and `--ignored`.
//! - Each test works in its own throwaway database, dropped at the end.
//! - The cache side runs on `MemoryBackend`, so no Redis is needed.

use std::sync::Arc;

use mongodb::bson::Document;
use mongodb::bson::oid::ObjectId;

use catalog_cache::Config;
use catalog_cache::cache::{BackendOp, CacheConfig, CacheManager, MemoryBackend};
use catalog_cache::database::models::{Album, Song, SongUpdate, User, UserUpdate};
use catalog_cache::database::{
    AlbumRepository, Database, RepositoryError, SongRepository, UserRepository,
};

struct Live {
    db: Database,
    backend: Arc<MemoryBackend>,
    cache: Arc<CacheManager>,
}

impl Live {
    async fn connect() -> anyhow::Result<Self> {
        let config = Config::from_env()?;
        let uri = config
            .mongodb_uri
            .ok_or_else(|| anyhow::anyhow!("MONGODB_URI must be set for live tests"))?;
        let name = format!("catalog_cache_live_{}", ObjectId::new().to_hex());
        let db = Database::connect(&uri, &name).await?;

        let backend = Arc::new(MemoryBackend::new());
        let cache = Arc::new(CacheManager::new(CacheConfig::default(), backend.clone()));
        Ok(Self { db, backend, cache })
    }

    async fn teardown(self) -> anyhow::Result<()> {
        for name in ["songs", "albums", "playlists", "users"] {
            self.db.collection::<Document>(name).drop().await?;
        }
        self.db.shutdown().await;
        Ok(())
    }
}

#[tokio::test]
#[ignore]
async fn live_song_writes_purge_cached_views() -> anyhow::Result<()> {
    let live = Live::connect().await?;
    let songs = SongRepository::new(&live.db, live.cache.clone());

    let created = songs
        .create(Song::new("Bohemian Rhapsody", "Queen", "Rock", 1975, 354))
        .await?;
    let id = created.id.ok_or_else(|| anyhow::anyhow!("insert returned no id"))?.to_hex();
    let item_key = format!("song:{id}");

    // Warm every view a song write touches. The uppercase id must land on
    // the canonical lowercase key.
    songs.get(&id.to_uppercase()).await?;
    songs.list().await?;
    let before = songs.artists().await?;
    assert_eq!(before[0].artist, "Queen");
    for key in [item_key.as_str(), "list:songs", "aggregation:artists"] {
        assert!(live.backend.contains(key), "{key} not cached");
    }

    let update = SongUpdate {
        artist: Some("Beatles".to_string()),
        ..SongUpdate::default()
    };
    let updated = songs.update(&id, &update).await?;
    assert_eq!(updated.artist, "Beatles");
    for key in [item_key.as_str(), "list:songs", "aggregation:artists"] {
        assert!(!live.backend.contains(key), "{key} survived the update");
    }

    let after = songs.artists().await?;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].artist, "Beatles");

    songs.get(&id).await?;
    songs.delete(&id).await?;
    assert!(!live.backend.contains(&item_key));
    assert!(matches!(
        songs.get(&id).await,
        Err(RepositoryError::NotFound { .. })
    ));
    assert!(!live.backend.contains(&item_key), "not-found was cached");
    assert!(matches!(
        songs.delete(&id).await,
        Err(RepositoryError::NotFound { .. })
    ));

    live.teardown().await
}

#[tokio::test]
#[ignore]
async fn live_empty_update_writes_and_purges_nothing() -> anyhow::Result<()> {
    let live = Live::connect().await?;
    let users = UserRepository::new(&live.db, live.cache.clone());

    let user = users
        .create(User::new("baitukas", "Jane", "Doe", "jane@example.com"))
        .await?;
    let id = user.id.ok_or_else(|| anyhow::anyhow!("insert returned no id"))?.to_hex();
    users.get(&id).await?;
    users.list().await?;

    let deletes = live.backend.calls(BackendOp::Delete);
    let scans = live.backend.calls(BackendOp::Scan);

    let unchanged = users.update(&id, &UserUpdate::default()).await?;
    assert_eq!(unchanged, user);
    assert_eq!(live.backend.calls(BackendOp::Delete), deletes);
    assert_eq!(live.backend.calls(BackendOp::Scan), scans);
    assert!(live.backend.contains(&format!("user:{id}")));
    assert!(live.backend.contains("list:users"));

    live.teardown().await
}

#[tokio::test]
#[ignore]
async fn live_album_song_count_tracks_song_writes() -> anyhow::Result<()> {
    let live = Live::connect().await?;
    let albums = AlbumRepository::new(&live.db, live.cache.clone());
    let songs = SongRepository::new(&live.db, live.cache.clone());

    let missing = ObjectId::new().to_hex();
    assert!(matches!(
        albums.song_count(&missing).await,
        Err(RepositoryError::NotFound { .. })
    ));
    assert!(!live.backend.contains(&format!("album:song_count:{missing}")));

    let album = albums
        .create(Album::new("A Night at the Opera", "Queen", 1975))
        .await?;
    let album_id = album.id.ok_or_else(|| anyhow::anyhow!("insert returned no id"))?;

    let mut track = Song::new("Love of My Life", "Queen", "Rock", 1975, 219);
    track.album_id = Some(album_id);
    songs.create(track.clone()).await?;

    let count = albums.song_count(&album_id.to_hex()).await?;
    assert_eq!(count.song_count, 1);
    assert!(live.backend.contains(&format!("album:song_count:{}", album_id.to_hex())));

    track.name = "Bohemian Rhapsody".to_string();
    songs.create(track).await?;
    let count = albums.song_count(&album_id.to_hex()).await?;
    assert_eq!(count.song_count, 2, "song create left a stale count");

    live.teardown().await
}
