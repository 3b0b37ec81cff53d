//! Catalog lookup for history tracks and per-artist top tracks.
//!
//! Catalog search results are noisy: a query for a title routinely returns
//! covers, remixes and unrelated songs sharing a word. Every candidate is
//! therefore checked against the requested pair, and several query shapes are
//! tried in a fixed order until one produces an exact-enough candidate.

use crate::events::{EventBroadcaster, ProgressEvent};
use crate::matching::WatchedArtistSet;
use crate::normalize::normalize_strict;
use crate::spotify::CatalogService;
use crate::types::{CatalogTrack, ScrobbleRecord};
use crate::VibegenError;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

/// Catalog responses never contain more than this many top tracks per artist.
pub const MAX_TOP_TRACKS: usize = 20;

/// Query shapes, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchStrategy {
    /// `track:"title" artist:"artist"`
    Exact,
    /// Title and artist swapped, for scrobbles with transposed metadata
    Swapped,
    /// `track:"title"` only
    TitleOnly,
    /// `artist:"artist" track:"title"`
    ArtistFirst,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 4] = [
        SearchStrategy::Exact,
        SearchStrategy::Swapped,
        SearchStrategy::TitleOnly,
        SearchStrategy::ArtistFirst,
    ];

    pub fn query(&self, title: &str, artist: &str) -> String {
        match self {
            SearchStrategy::Exact => format!("track:\"{title}\" artist:\"{artist}\""),
            SearchStrategy::Swapped => format!("track:\"{artist}\" artist:\"{title}\""),
            SearchStrategy::TitleOnly => format!("track:\"{title}\""),
            SearchStrategy::ArtistFirst => format!("artist:\"{artist}\" track:\"{title}\""),
        }
    }
}

/// Whether a search candidate is the requested track.
///
/// Both sides go through [`normalize_strict`]; the pair must match directly or
/// with title and artist swapped.
pub fn candidate_matches(candidate: &CatalogTrack, title: &str, artist: &str) -> bool {
    let name = normalize_strict(&candidate.name);
    let candidate_artist = normalize_strict(&candidate.artist_name);
    let title = normalize_strict(title);
    let artist = normalize_strict(artist);

    (name == title && candidate_artist == artist) || (name == artist && candidate_artist == title)
}

/// Tuning for [`CatalogSearcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates requested per query
    pub candidate_limit: u32,
    /// Tracks looked up concurrently; results keep input order regardless
    pub search_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 5,
            search_concurrency: 1,
        }
    }
}

impl SearchConfig {
    pub fn with_candidate_limit(mut self, candidate_limit: u32) -> Self {
        self.candidate_limit = candidate_limit;
        self
    }

    pub fn with_search_concurrency(mut self, search_concurrency: usize) -> Self {
        self.search_concurrency = search_concurrency;
        self
    }
}

/// Result of looking up one history track.
#[derive(Debug)]
pub enum SearchOutcome {
    Found {
        track: CatalogTrack,
        strategy: SearchStrategy,
    },
    /// Every strategy ran without an acceptable candidate.
    NotFound,
    /// A query failed; remaining strategies were skipped.
    Failed { error: VibegenError },
}

impl SearchOutcome {
    pub fn track(&self) -> Option<&CatalogTrack> {
        match self {
            SearchOutcome::Found { track, .. } => Some(track),
            _ => None,
        }
    }
}

/// Aggregate of [`CatalogSearcher::search_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Matched catalog tracks, in input order
    pub found: Vec<CatalogTrack>,
    pub not_found: Vec<ScrobbleRecord>,
    pub failed: Vec<ScrobbleRecord>,
}

pub struct CatalogSearcher<C> {
    catalog: C,
    config: SearchConfig,
    events: Option<EventBroadcaster>,
}

impl<C: CatalogService> CatalogSearcher<C> {
    pub fn new(catalog: C, config: SearchConfig) -> Self {
        Self {
            catalog,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Look up one track, trying each [`SearchStrategy`] in order.
    pub async fn search(&self, title: &str, artist: &str) -> SearchOutcome {
        for strategy in SearchStrategy::ALL {
            let query = strategy.query(title, artist);
            let candidates = match self
                .catalog
                .search_tracks(&query, self.config.candidate_limit)
                .await
            {
                Ok(candidates) => candidates,
                Err(error) => {
                    log::warn!("Search for '{title}' by '{artist}' failed: {error}");
                    return SearchOutcome::Failed { error };
                }
            };

            if let Some(track) = candidates
                .into_iter()
                .find(|candidate| candidate_matches(candidate, title, artist))
            {
                log::debug!(
                    "Matched '{title}' by '{artist}' to {} via {strategy:?}",
                    track.id
                );
                return SearchOutcome::Found { track, strategy };
            }
        }

        log::warn!("Track '{title}' by '{artist}' not found in catalog");
        SearchOutcome::NotFound
    }

    /// Look up every record; misses and failures are collected, never fatal.
    pub async fn search_all(&self, records: &[ScrobbleRecord]) -> MatchReport {
        let total = records.len();
        let mut report = MatchReport::default();

        let mut results = stream::iter(records)
            .map(|record| async move {
                let outcome = self.search(&record.title, &record.artist).await;
                (record, outcome)
            })
            .buffered(self.config.search_concurrency.max(1));

        let mut completed = 0;
        while let Some((record, outcome)) = results.next().await {
            completed += 1;
            let found = matches!(outcome, SearchOutcome::Found { .. });
            match outcome {
                SearchOutcome::Found { track, .. } => report.found.push(track),
                SearchOutcome::NotFound => report.not_found.push(record.clone()),
                SearchOutcome::Failed { .. } => report.failed.push(record.clone()),
            }

            if let Some(events) = &self.events {
                events.broadcast_event(ProgressEvent::TrackSearched {
                    timestamp: chrono::Utc::now(),
                    completed,
                    total,
                    title: record.title.clone(),
                    artist: record.artist.clone(),
                    found,
                });
            }
        }

        log::info!("Found {} of {} tracks in catalog", report.found.len(), total);
        report
    }

    /// The first `count` (1 to [`MAX_TOP_TRACKS`]) top tracks of an artist.
    ///
    /// The catalog artist must match `artist_name` exactly, ignoring case;
    /// anything else (no result, a near miss, a failed request) is logged and
    /// yields an empty list.
    pub async fn artist_top_tracks(&self, artist_name: &str, count: usize) -> Vec<CatalogTrack> {
        let count = count.clamp(1, MAX_TOP_TRACKS);
        let query = format!("artist:\"{artist_name}\"");

        let artist = match self.catalog.search_artists(&query, 1).await {
            Ok(artists) => artists.into_iter().next(),
            Err(e) => {
                log::warn!("Could not look up artist '{artist_name}': {e}");
                return Vec::new();
            }
        };

        let Some(artist) = artist else {
            log::warn!("Artist '{artist_name}' not found in catalog");
            return Vec::new();
        };

        if artist.name.to_lowercase() != artist_name.to_lowercase() {
            log::warn!(
                "Artist '{artist_name}' not found exactly in catalog (found: {})",
                artist.name
            );
            return Vec::new();
        }

        match self.catalog.artist_top_tracks(&artist.id).await {
            Ok(mut tracks) => {
                tracks.truncate(count);
                tracks
            }
            Err(e) => {
                log::warn!("Could not fetch top tracks for '{artist_name}': {e}");
                Vec::new()
            }
        }
    }

    /// Top tracks for every watched artist, artist by artist.
    pub async fn top_tracks_for(&self, watched: &WatchedArtistSet, count: usize) -> Vec<CatalogTrack> {
        let mut tracks = Vec::new();
        for artist in watched.iter() {
            tracks.extend(self.artist_top_tracks(&artist.display_name, count).await);
        }
        tracks
    }
}
