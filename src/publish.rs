use crate::events::{EventBroadcaster, ProgressEvent};
use crate::spotify::{CatalogService, MAX_TRACKS_PER_REQUEST};
use crate::types::Playlist;
use crate::{Result, VibegenError};

/// Outcome of submitting one chunk of track ids.
#[derive(Debug)]
pub struct ChunkResult {
    /// 0-based chunk number
    pub index: usize,
    pub size: usize,
    pub error: Option<VibegenError>,
}

impl ChunkResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub struct PublishReport {
    pub playlist: Playlist,
    pub chunks: Vec<ChunkResult>,
}

impl PublishReport {
    /// Number of tracks in chunks that were accepted.
    pub fn tracks_added(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.success())
            .map(|c| c.size)
            .sum()
    }

    pub fn failed_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| !c.success()).count()
    }
}

/// Split track ids into request-sized chunks, preserving order.
pub fn chunk_ids(ids: &[String]) -> std::slice::Chunks<'_, String> {
    ids.chunks(MAX_TRACKS_PER_REQUEST)
}

/// Creates a playlist and fills it in chunks the catalog accepts.
pub struct PlaylistPublisher<C> {
    catalog: C,
    public: bool,
    events: Option<EventBroadcaster>,
}

impl<C: CatalogService> PlaylistPublisher<C> {
    /// New publisher creating private playlists.
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            public: false,
            events: None,
        }
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_events(mut self, events: EventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    /// Create a playlist named `name` owned by `owner_id` and add `track_ids`.
    ///
    /// Only playlist creation can fail the call; failed chunks are reported
    /// in the returned [`PublishReport`].
    pub async fn publish(
        &self,
        owner_id: &str,
        name: &str,
        track_ids: &[String],
    ) -> Result<PublishReport> {
        let playlist = self
            .catalog
            .create_playlist(owner_id, name, self.public)
            .await?;
        log::info!("Created playlist '{}' ({})", name, playlist.id);

        if track_ids.is_empty() {
            log::warn!("No tracks to add; playlist '{name}' stays empty");
        }

        let chunks = self.add_tracks(&playlist.id, track_ids).await;
        Ok(PublishReport { playlist, chunks })
    }

    /// Add tracks to an existing playlist, one chunk at a time.
    ///
    /// A failing chunk is logged and recorded; later chunks are still sent.
    pub async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Vec<ChunkResult> {
        let total = track_ids.len();
        let mut submitted = 0;
        let mut results = Vec::new();

        for (index, chunk) in chunk_ids(track_ids).enumerate() {
            let error = self
                .catalog
                .add_tracks_to_playlist(playlist_id, chunk)
                .await
                .err();
            submitted += chunk.len();

            if let Some(e) = &error {
                log::warn!("Failed to add batch {} to playlist: {}", index + 1, e);
            } else {
                log::debug!("Added tracks {submitted}/{total}");
            }

            if let Some(events) = &self.events {
                events.broadcast_event(ProgressEvent::ChunkSubmitted {
                    timestamp: chrono::Utc::now(),
                    completed: submitted,
                    total,
                    success: error.is_none(),
                });
            }

            results.push(ChunkResult {
                index,
                size: chunk.len(),
                error,
            });
        }
        results
    }
}
