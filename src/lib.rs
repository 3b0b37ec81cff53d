//! Build a playlist of a listener's favourite tracks by a set of artists.
//!
//! A run walks a Last.fm history backwards in concurrent waves, keeps the
//! scrobbles by the requested artists, finds each of them in the Spotify
//! catalog, optionally adds every artist's top tracks, and publishes the
//! deduplicated result as a new playlist.
//!
//! ```rust,no_run
//! use vibegen::{LastFmApiClient, PlaylistRequest, SpotifyClient, VibeGenerator};
//!
//! #[tokio::main]
//! async fn main() -> vibegen::Result<()> {
//!     let history = LastFmApiClient::new(
//!         Box::new(http_client::native::NativeClient::new()),
//!         "lastfm-api-key".to_string(),
//!     );
//!     let catalog = SpotifyClient::new(
//!         Box::new(http_client::native::NativeClient::new()),
//!         "spotify-access-token".to_string(),
//!     );
//!
//!     let request = PlaylistRequest::new("rj", "Daft Punk, Justice", "French Touch")?;
//!     let summary = VibeGenerator::new(history, catalog).generate(&request).await?;
//!     println!("Added {} tracks", summary.tracks_added());
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod events;
pub mod generator;
pub mod history;
pub mod lastfm;
pub mod matching;
pub mod normalize;
pub mod publish;
pub mod retry;
pub mod search;
pub mod spotify;
pub mod track_set;
pub mod types;

pub use cancel::CancellationState;
pub use config::{Credentials, Settings};
pub use error::VibegenError;
pub use events::{EventBroadcaster, ProgressEvent, ProgressEventReceiver, ProgressEventWatcher};
pub use generator::{CollectedTracks, PlaylistRequest, RunSummary, VibeGenerator};
pub use history::{
    BatchOutcome, FetchConfig, FetchReport, HistoryFetcher, TerminationPolicy, TrackCollector,
};
pub use lastfm::{HistorySource, LastFmApiClient};
pub use matching::{artist_matches, WatchedArtist, WatchedArtistSet};
pub use normalize::{normalize, normalize_strict};
pub use publish::{ChunkResult, PlaylistPublisher, PublishReport};
pub use retry::RetryConfig;
pub use search::{CatalogSearcher, MatchReport, SearchConfig, SearchOutcome, SearchStrategy};
pub use spotify::{CatalogService, SpotifyClient};
pub use track_set::{merge_tracks, TrackSetBuilder};
pub use types::{CatalogArtist, CatalogTrack, FetchWindow, Playlist, ScrobbleRecord, TrackKey, UserHandle};

#[cfg(feature = "mock")]
pub use lastfm::MockHistorySource;
#[cfg(feature = "mock")]
pub use spotify::MockCatalogService;

pub type Result<T> = std::result::Result<T, VibegenError>;
