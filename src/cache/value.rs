//! Typed cache values.
//!
//! Only the shapes listed here can be stored, and each is tied to the key
//! family it may live under. Entries are UTF-8 JSON.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::CacheError;
use super::keys::{CacheKey, KeyFamily};
use crate::database::models::{
    Album, AlbumSongCount, ArtistSongs, Playlist, PlaylistSongs, PlaylistSummary, Song, User,
};

mod sealed {
    pub trait Sealed {}
}

/// A value shape that may be cached.
pub trait CacheValue: Serialize + DeserializeOwned + Send + sealed::Sealed {
    const FAMILY: KeyFamily;

    /// Error unless `key` belongs to this shape's family.
    fn check_family(key: &CacheKey) -> Result<(), CacheError> {
        let actual = key.family();
        if actual == Self::FAMILY {
            Ok(())
        } else {
            Err(CacheError::FamilyMismatch {
                key: key.to_string(),
                expected: Self::FAMILY,
                actual,
            })
        }
    }

    fn encode(&self, key: &CacheKey) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(self).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })
    }

    fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

macro_rules! cache_value {
    ($family:ident => $($ty:ty),+ $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl CacheValue for $ty {
                const FAMILY: KeyFamily = KeyFamily::$family;
            }
        )+
    };
}

cache_value!(Item => Song, Album, Playlist, User);
cache_value!(List => Vec<Song>, Vec<Album>, Vec<Playlist>, Vec<User>);
cache_value!(Aggregation => Vec<ArtistSongs>, AlbumSongCount, PlaylistSummary);
cache_value!(Relation => PlaylistSongs);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::EntityKind;

    #[test]
    fn family_check_rejects_wrong_key() {
        let item = CacheKey::item(EntityKind::Song, "S1").unwrap();
        assert!(Song::check_family(&item).is_ok());

        let err = Vec::<Song>::check_family(&item).unwrap_err();
        assert!(matches!(
            err,
            CacheError::FamilyMismatch {
                expected: KeyFamily::List,
                actual: KeyFamily::Item,
                ..
            }
        ));
    }

    #[test]
    fn encoded_value_is_json() {
        let key = CacheKey::album_song_count("A1").unwrap();
        let count = AlbumSongCount {
            album_id: "A1".into(),
            song_count: 12,
        };
        let bytes = count.encode(&key).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"album_id":"A1","song_count":12}"#
        );
        assert_eq!(AlbumSongCount::decode(&bytes).unwrap(), count);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(Song::decode(b"not json").is_err());
    }
}
