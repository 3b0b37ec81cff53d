#![allow(dead_code)]

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use vibegen::{
    CancellationState, CatalogArtist, CatalogService, CatalogTrack, HistorySource, Playlist,
    Result, ScrobbleRecord, UserHandle, VibegenError,
};

/// In-memory listening history.
///
/// Answers `get_recent_tracks` with the scrobbles played strictly before
/// `time_to`, newest first, and records every window it was asked for.
#[derive(Default)]
pub struct FakeHistory {
    users: HashSet<String>,
    scrobbles: Vec<ScrobbleRecord>,
    failing_windows: HashSet<i64>,
    cancel_after: Option<(usize, CancellationState)>,
    calls: RefCell<Vec<i64>>,
}

impl FakeHistory {
    pub fn new(user: &str) -> Self {
        Self {
            users: HashSet::from([user.to_string()]),
            ..Self::default()
        }
    }

    pub fn with_scrobbles(mut self, scrobbles: Vec<ScrobbleRecord>) -> Self {
        self.scrobbles = scrobbles;
        self.scrobbles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self
    }

    pub fn with_failing_window(mut self, time_to: i64) -> Self {
        self.failing_windows.insert(time_to);
        self
    }

    /// Trigger `cancel` once `calls` windows have been requested.
    pub fn cancel_after(mut self, calls: usize, cancel: CancellationState) -> Self {
        self.cancel_after = Some((calls, cancel));
        self
    }

    pub fn calls(&self) -> Vec<i64> {
        self.calls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl HistorySource for FakeHistory {
    async fn get_user(&self, handle: &str) -> Result<UserHandle> {
        if self.users.contains(handle) {
            Ok(UserHandle::new(handle))
        } else {
            Err(VibegenError::UnknownUser(handle.to_string()))
        }
    }

    async fn get_recent_tracks(
        &self,
        _user: &UserHandle,
        limit: u32,
        time_to: i64,
    ) -> Result<Vec<ScrobbleRecord>> {
        self.calls.borrow_mut().push(time_to);

        if let Some((calls, cancel)) = &self.cancel_after {
            if self.calls.borrow().len() >= *calls {
                cancel.cancel();
            }
        }

        if self.failing_windows.contains(&time_to) {
            return Err(VibegenError::Http("connection reset".to_string()));
        }

        Ok(self
            .scrobbles
            .iter()
            .filter(|s| s.timestamp < time_to)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Scripted catalog that records every call it receives.
#[derive(Default)]
pub struct FakeCatalog {
    user_id: Option<String>,
    track_results: HashMap<String, Vec<CatalogTrack>>,
    failing_queries: HashSet<String>,
    artist_results: HashMap<String, Vec<CatalogArtist>>,
    failing_artist_queries: HashSet<String>,
    top_tracks: HashMap<String, Vec<CatalogTrack>>,
    failing_create: bool,
    failing_chunks: HashSet<usize>,
    queries: RefCell<Vec<String>>,
    created: RefCell<Vec<(String, String, bool)>>,
    chunks: RefCell<Vec<Vec<String>>>,
}

impl FakeCatalog {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    /// A catalog whose token is rejected.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, tracks: Vec<CatalogTrack>) -> Self {
        self.track_results.insert(query.to_string(), tracks);
        self
    }

    pub fn with_failing_search(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_string());
        self
    }

    pub fn with_artist(mut self, query: &str, artist: CatalogArtist) -> Self {
        self.artist_results.insert(query.to_string(), vec![artist]);
        self
    }

    pub fn with_failing_artist_search(mut self, query: &str) -> Self {
        self.failing_artist_queries.insert(query.to_string());
        self
    }

    pub fn with_top_tracks(mut self, artist_id: &str, tracks: Vec<CatalogTrack>) -> Self {
        self.top_tracks.insert(artist_id.to_string(), tracks);
        self
    }

    pub fn with_failing_create(mut self) -> Self {
        self.failing_create = true;
        self
    }

    /// Make the chunk with this 0-based index fail.
    pub fn with_failing_chunk(mut self, index: usize) -> Self {
        self.failing_chunks.insert(index);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }

    pub fn created(&self) -> Vec<(String, String, bool)> {
        self.created.borrow().clone()
    }

    pub fn chunks(&self) -> Vec<Vec<String>> {
        self.chunks.borrow().clone()
    }
}

#[async_trait(?Send)]
impl CatalogService for FakeCatalog {
    async fn current_user_id(&self) -> Result<String> {
        self.user_id
            .clone()
            .ok_or_else(|| VibegenError::Auth("The access token expired".to_string()))
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>> {
        self.queries.borrow_mut().push(query.to_string());
        if self.failing_queries.contains(query) {
            return Err(VibegenError::Api {
                status: 500,
                message: "Server error".to_string(),
            });
        }
        let mut tracks = self.track_results.get(query).cloned().unwrap_or_default();
        tracks.truncate(limit as usize);
        Ok(tracks)
    }

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<CatalogArtist>> {
        self.queries.borrow_mut().push(query.to_string());
        if self.failing_artist_queries.contains(query) {
            return Err(VibegenError::Http("timeout".to_string()));
        }
        let mut artists = self.artist_results.get(query).cloned().unwrap_or_default();
        artists.truncate(limit as usize);
        Ok(artists)
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<CatalogTrack>> {
        Ok(self.top_tracks.get(artist_id).cloned().unwrap_or_default())
    }

    async fn create_playlist(&self, owner_id: &str, name: &str, public: bool) -> Result<Playlist> {
        if self.failing_create {
            return Err(VibegenError::Api {
                status: 403,
                message: "Insufficient client scope".to_string(),
            });
        }
        self.created
            .borrow_mut()
            .push((owner_id.to_string(), name.to_string(), public));
        Ok(Playlist {
            id: "playlist-1".to_string(),
            url: Some("https://open.spotify.com/playlist/playlist-1".to_string()),
        })
    }

    async fn add_tracks_to_playlist(&self, _playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let index = self.chunks.borrow().len();
        self.chunks.borrow_mut().push(track_ids.to_vec());
        if self.failing_chunks.contains(&index) {
            return Err(VibegenError::Http("connection reset".to_string()));
        }
        Ok(())
    }
}

pub fn scrobble(title: &str, artist: &str, timestamp: i64) -> ScrobbleRecord {
    ScrobbleRecord::new(title, artist, timestamp)
}

pub fn track(id: &str, name: &str, artist: &str) -> CatalogTrack {
    CatalogTrack::new(id, name, artist)
}

/// Drain every event currently buffered in a receiver.
pub fn drain_events(receiver: &mut vibegen::ProgressEventReceiver) -> Vec<vibegen::ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
