//! Repository module - cached access to the catalog collections.
//!
//! Reads go through the read-through cache. Writes commit to MongoDB first
//! and then invalidate synchronously, before returning to the caller.

mod album_repository;
mod catalog;
mod playlist_repository;
mod song_repository;
mod user_repository;

use mongodb::bson::oid::ObjectId;
use thiserror::Error;

use crate::cache::{CacheError, EntityKind};

pub use album_repository::AlbumRepository;
pub use catalog::{CatalogCollection, CatalogDocument, LIST_LIMIT};
pub use playlist_repository::PlaylistRepository;
pub use song_repository::SongRepository;
pub use user_repository::UserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("invalid {kind} id {id:?}")]
    InvalidId { kind: EntityKind, id: String },

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("cannot encode update: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;

/// Parse a hex ObjectId.
pub(crate) fn parse_id(kind: EntityKind, id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| RepositoryError::InvalidId {
        kind,
        id: id.to_string(),
    })
}
