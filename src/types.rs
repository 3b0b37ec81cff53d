//! Data types shared by the history, catalog and playlist stages.
//!
//! History-side values ([`ScrobbleRecord`], [`FetchWindow`]) only live for the
//! duration of a fetch. [`CatalogTrack`] is the only value that survives into
//! the published playlist.

use crate::normalize::normalize;
use serde::{Deserialize, Serialize};

// ================================================================================================
// HISTORY SOURCE
// ================================================================================================

/// A single logged play from the history source.
///
/// # Examples
///
/// ```rust
/// use vibegen::ScrobbleRecord;
///
/// let scrobble = ScrobbleRecord::new("Around the World", "Daft Punk", 1640995200);
/// assert_eq!(scrobble.key(), ScrobbleRecord::new("around the world", "DAFT PUNK", 0).key());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrobbleRecord {
    /// The track title
    pub title: String,
    /// The credited artist, exactly as the history source reports it
    pub artist: String,
    /// Unix timestamp of the play
    pub timestamp: i64,
}

impl ScrobbleRecord {
    pub fn new(title: &str, artist: &str, timestamp: i64) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            timestamp,
        }
    }

    /// The dedup identity of this scrobble.
    pub fn key(&self) -> TrackKey {
        TrackKey::new(&self.title, &self.artist)
    }
}

/// Normalized `(title, artist)` pair identifying a song in listening history.
///
/// Two scrobbles with the same key are the same song for playlist purposes,
/// whenever they were played.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    pub title: String,
    pub artist: String,
}

impl TrackKey {
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            title: normalize(title),
            artist: normalize(artist),
        }
    }
}

/// One pagination request against the history source: up to `batch_size`
/// scrobbles played before `time_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    /// Upper bound (exclusive) of the window as a Unix timestamp
    pub time_to: i64,
    pub batch_size: u32,
}

/// A resolved history-source user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserHandle {
    /// Canonical user name as returned by the service
    pub name: String,
    /// Total number of scrobbles, if reported
    pub playcount: Option<u64>,
    /// Registration time as a Unix timestamp, if reported
    pub registered: Option<i64>,
}

impl UserHandle {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            playcount: None,
            registered: None,
        }
    }
}

// ================================================================================================
// CATALOG
// ================================================================================================

/// A track in the target catalog.
///
/// `id` is opaque and unique; it is the identity used for playlist membership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    /// Name of the first credited artist
    pub artist_name: String,
}

impl CatalogTrack {
    pub fn new(id: &str, name: &str, artist_name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            artist_name: artist_name.to_string(),
        }
    }
}

/// An artist in the target catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
}

/// A playlist created on the target service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    /// Link for opening the playlist in a browser, if the service returned one
    pub url: Option<String>,
}
