//! # Progress Events
//!
//! Broadcast channel for progress reporting. The engine never holds
//! presentation state; it emits [`ProgressEvent`]s and whoever renders
//! progress bars subscribes to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Events emitted while a playlist is being generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressEvent {
    /// A wave of history windows has been fetched and merged.
    WaveCompleted {
        timestamp: DateTime<Utc>,
        /// 1-based wave number
        wave: u32,
        /// Windows dispatched in this wave
        batches: usize,
        /// Windows whose request failed in this wave
        failed_batches: usize,
        /// Tracks first seen in this wave
        new_tracks: usize,
        /// Unique tracks found so far
        total_tracks: usize,
        /// Upper bound of the oldest window fetched so far
        oldest_time_to: i64,
    },
    /// One history track has been looked up in the catalog.
    TrackSearched {
        timestamp: DateTime<Utc>,
        completed: usize,
        total: usize,
        title: String,
        artist: String,
        found: bool,
    },
    /// One chunk of playlist ids has been submitted.
    ChunkSubmitted {
        timestamp: DateTime<Utc>,
        /// Ids submitted so far, including this chunk
        completed: usize,
        total: usize,
        success: bool,
    },
    /// The run has finished.
    RunFinished {
        timestamp: DateTime<Utc>,
        tracks_found: usize,
        tracks_added: usize,
    },
}

impl ProgressEvent {
    /// `(completed, total)` for events that describe a bounded amount of work.
    pub fn progress(&self) -> Option<(usize, usize)> {
        match self {
            ProgressEvent::TrackSearched {
                completed, total, ..
            }
            | ProgressEvent::ChunkSubmitted {
                completed, total, ..
            } => Some((*completed, *total)),
            _ => None,
        }
    }
}

/// Type alias for the broadcast receiver
pub type ProgressEventReceiver = broadcast::Receiver<ProgressEvent>;

/// Type alias for the watch receiver
pub type ProgressEventWatcher = watch::Receiver<Option<ProgressEvent>>;

/// Shared event broadcasting state, cheap to clone into every stage of a run.
#[derive(Clone)]
pub struct EventBroadcaster {
    event_tx: broadcast::Sender<ProgressEvent>,
    last_event_tx: watch::Sender<Option<ProgressEvent>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (last_event_tx, _) = watch::channel(None);

        Self {
            event_tx,
            last_event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: ProgressEvent) {
        let _ = self.event_tx.send(event.clone());
        self.last_event_tx.send_replace(Some(event));
    }

    pub fn subscribe(&self) -> ProgressEventReceiver {
        self.event_tx.subscribe()
    }

    /// Watch only the most recent event; useful for progress bars that can
    /// skip intermediate updates.
    pub fn watch(&self) -> ProgressEventWatcher {
        self.last_event_tx.subscribe()
    }

    pub fn latest_event(&self) -> Option<ProgressEvent> {
        self.last_event_tx.borrow().clone()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast_event(ProgressEvent::ChunkSubmitted {
            timestamp: Utc::now(),
            completed: 100,
            total: 250,
            success: true,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.progress(), Some((100, 250)));
        assert_eq!(broadcaster.latest_event(), Some(event));
    }

    #[test]
    fn test_broadcast_without_subscribers_keeps_latest() {
        let broadcaster = EventBroadcaster::new();
        assert!(broadcaster.latest_event().is_none());

        broadcaster.broadcast_event(ProgressEvent::RunFinished {
            timestamp: Utc::now(),
            tracks_found: 3,
            tracks_added: 2,
        });

        assert!(matches!(
            broadcaster.latest_event(),
            Some(ProgressEvent::RunFinished {
                tracks_found: 3,
                ..
            })
        ));
    }
}
