//! Catalog document models.

pub mod aggregation;
pub mod album;
pub mod playlist;
pub mod song;
pub mod user;

pub use aggregation::{
    AlbumSongCount, ArtistSong, ArtistSongs, PlaylistSongs, PlaylistSummary, PlaylistTrack,
};
pub use album::{Album, AlbumUpdate};
pub use playlist::{Playlist, PlaylistUpdate};
pub use song::{Song, SongUpdate};
pub use user::{User, UserUpdate};
