use crate::cancel::CancellationState;
use crate::events::{EventBroadcaster, ProgressEvent};
use crate::history::{FetchConfig, FetchReport, HistoryFetcher};
use crate::lastfm::HistorySource;
use crate::matching::WatchedArtistSet;
use crate::publish::{PlaylistPublisher, PublishReport};
use crate::search::{CatalogSearcher, MatchReport, SearchConfig, MAX_TOP_TRACKS};
use crate::spotify::CatalogService;
use crate::track_set::merge_tracks;
use crate::types::CatalogTrack;
use crate::{Result, VibegenError};

/// Top tracks per artist when the caller does not pick a number.
pub const DEFAULT_TOP_TRACKS: usize = 10;

/// A validated playlist request.
///
/// # Examples
///
/// ```rust
/// use vibegen::PlaylistRequest;
///
/// let request = PlaylistRequest::new("rj", "Daft Punk, Justice", "French Touch")
///     .unwrap()
///     .with_top_tracks(5)
///     .unwrap();
/// assert_eq!(request.artists.len(), 2);
/// assert_eq!(request.top_tracks, Some(5));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRequest {
    pub history_user: String,
    pub artists: WatchedArtistSet,
    pub playlist_name: String,
    /// Top tracks to add per artist, or `None` to add none
    pub top_tracks: Option<usize>,
}

impl PlaylistRequest {
    /// Build a request from raw form input; `artists` is comma separated.
    ///
    /// Top tracks default to [`DEFAULT_TOP_TRACKS`] per artist.
    pub fn new(history_user: &str, artists: &str, playlist_name: &str) -> Result<Self> {
        let history_user = history_user.trim();
        let playlist_name = playlist_name.trim();
        let artists = WatchedArtistSet::from_comma_separated(artists);

        if history_user.is_empty() {
            return Err(VibegenError::Config("history user name is required".to_string()));
        }
        if artists.is_empty() {
            return Err(VibegenError::Config("at least one artist is required".to_string()));
        }
        if playlist_name.is_empty() {
            return Err(VibegenError::Config("playlist name is required".to_string()));
        }

        Ok(Self {
            history_user: history_user.to_string(),
            artists,
            playlist_name: playlist_name.to_string(),
            top_tracks: Some(DEFAULT_TOP_TRACKS),
        })
    }

    /// Add `count` top tracks per artist; `count` must be between 1 and 20.
    pub fn with_top_tracks(mut self, count: usize) -> Result<Self> {
        if !(1..=MAX_TOP_TRACKS).contains(&count) {
            return Err(VibegenError::Config(format!(
                "top tracks per artist must be between 1 and {MAX_TOP_TRACKS}, got {count}"
            )));
        }
        self.top_tracks = Some(count);
        Ok(self)
    }

    pub fn without_top_tracks(mut self) -> Self {
        self.top_tracks = None;
        self
    }
}

/// Everything gathered before publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedTracks {
    pub fetch: FetchReport,
    pub matches: MatchReport,
    pub top_tracks: Vec<CatalogTrack>,
    /// Final deduplicated playlist content
    pub tracks: Vec<CatalogTrack>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub owner_id: String,
    pub collected: CollectedTracks,
    /// `None` when there was nothing to publish
    pub publish: Option<PublishReport>,
}

impl RunSummary {
    pub fn tracks_found(&self) -> usize {
        self.collected.tracks.len()
    }

    pub fn tracks_added(&self) -> usize {
        self.publish
            .as_ref()
            .map(PublishReport::tracks_added)
            .unwrap_or(0)
    }
}

/// Runs the whole pipeline: history fetch, catalog matching, top tracks,
/// deduplication and publishing.
pub struct VibeGenerator<H, C> {
    history: H,
    catalog: C,
    fetch_config: FetchConfig,
    search_config: SearchConfig,
    public_playlist: bool,
    events: EventBroadcaster,
    cancel: CancellationState,
}

impl<H: HistorySource, C: CatalogService> VibeGenerator<H, C> {
    pub fn new(history: H, catalog: C) -> Self {
        Self {
            history,
            catalog,
            fetch_config: FetchConfig::default(),
            search_config: SearchConfig::default(),
            public_playlist: false,
            events: EventBroadcaster::new(),
            cancel: CancellationState::new(),
        }
    }

    pub fn with_fetch_config(mut self, config: FetchConfig) -> Self {
        self.fetch_config = config;
        self
    }

    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search_config = config;
        self
    }

    pub fn with_public_playlist(mut self, public: bool) -> Self {
        self.public_playlist = public;
        self
    }

    pub fn with_events(mut self, events: EventBroadcaster) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationState) -> Self {
        self.cancel = cancel;
        self
    }

    /// Broadcaster carrying the run's [`ProgressEvent`]s.
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn cancellation(&self) -> &CancellationState {
        &self.cancel
    }

    /// Gather the playlist content without creating anything.
    ///
    /// Fails only if the history user cannot be resolved. When the history
    /// holds no tracks by the requested artists, no catalog lookups are made.
    pub async fn collect(&self, request: &PlaylistRequest) -> Result<CollectedTracks> {
        let fetcher = HistoryFetcher::new(&self.history, self.fetch_config.clone())
            .with_events(self.events.clone())
            .with_cancellation(self.cancel.clone());
        let fetch = fetcher.fetch(&request.history_user, &request.artists).await?;

        if fetch.tracks.is_empty() {
            log::warn!("No scrobbles found for the requested artists");
            return Ok(CollectedTracks {
                fetch,
                matches: MatchReport::default(),
                top_tracks: Vec::new(),
                tracks: Vec::new(),
            });
        }

        let searcher = CatalogSearcher::new(&self.catalog, self.search_config.clone())
            .with_events(self.events.clone());
        let matches = searcher.search_all(&fetch.tracks).await;

        let top_tracks = match request.top_tracks {
            Some(count) => {
                log::info!("Adding top {count} tracks per artist");
                searcher.top_tracks_for(&request.artists, count).await
            }
            None => Vec::new(),
        };

        let tracks = merge_tracks(matches.found.clone(), top_tracks.clone());
        log::info!("{} tracks in total", tracks.len());

        Ok(CollectedTracks {
            fetch,
            matches,
            top_tracks,
            tracks,
        })
    }

    /// Collect tracks and publish them as a new playlist.
    ///
    /// Fatal errors are an unauthenticated catalog client, an unknown history
    /// user and a playlist that cannot be created. Everything else is logged
    /// and reflected in the counts of the returned summary.
    pub async fn generate(&self, request: &PlaylistRequest) -> Result<RunSummary> {
        let owner_id = self.catalog.current_user_id().await?;
        let collected = self.collect(request).await?;

        let publish = if collected.tracks.is_empty() {
            log::warn!("No catalog tracks found; not creating playlist");
            None
        } else {
            let ids: Vec<String> = collected.tracks.iter().map(|t| t.id.clone()).collect();
            let publisher = PlaylistPublisher::new(&self.catalog)
                .with_public(self.public_playlist)
                .with_events(self.events.clone());
            Some(
                publisher
                    .publish(&owner_id, &request.playlist_name, &ids)
                    .await?,
            )
        };

        let summary = RunSummary {
            owner_id,
            collected,
            publish,
        };

        self.events.broadcast_event(ProgressEvent::RunFinished {
            timestamp: chrono::Utc::now(),
            tracks_found: summary.tracks_found(),
            tracks_added: summary.tracks_added(),
        });

        Ok(summary)
    }
}
