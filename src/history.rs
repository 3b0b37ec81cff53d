//! Backward-chronological retrieval of a user's scrobbles for a set of artists.
//!
//! History is walked in waves. Each wave is a group of [`FetchWindow`]s whose
//! `time_to` cursors are computed up front, so the windows can be requested
//! concurrently on a bounded pool. A wave is fully drained before its results
//! are merged and the next wave is generated; only the coordinator touches the
//! seen-set and the empty-wave counter.

use crate::cancel::CancellationState;
use crate::events::{EventBroadcaster, ProgressEvent};
use crate::lastfm::HistorySource;
use crate::matching::WatchedArtistSet;
use crate::types::{FetchWindow, ScrobbleRecord, TrackKey, UserHandle};
use crate::{Result, VibegenError};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const THIRTY_DAYS_SECS: i64 = 30 * 24 * 60 * 60;

/// When a wave counts as "empty" for termination purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationPolicy {
    /// A wave is empty when it contributes no new unique matching track,
    /// whether the history returned nothing or returned only other artists.
    #[default]
    NoNewMatches,
    /// A wave is empty only when every window came back without any raw
    /// scrobbles (failed windows count as empty). A wave with scrobbles resets
    /// the counter even if none of them matched.
    UpstreamExhausted,
}

/// Tuning for [`HistoryFetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Windows generated and dispatched per wave
    pub windows_per_wave: usize,
    /// Concurrent requests within a wave
    pub max_workers: usize,
    /// Distance between consecutive window cursors, in seconds
    pub window_step_secs: i64,
    /// Scrobbles requested per window
    pub batch_size: u32,
    /// Consecutive empty waves after which fetching stops
    pub empty_wave_limit: u32,
    pub termination_policy: TerminationPolicy,
    /// Initial cursor; `None` means the current time
    pub start_time: Option<i64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            windows_per_wave: 24,
            max_workers: 8,
            window_step_secs: THIRTY_DAYS_SECS,
            batch_size: 900,
            empty_wave_limit: 3,
            termination_policy: TerminationPolicy::NoNewMatches,
            start_time: None,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_windows_per_wave(mut self, windows_per_wave: usize) -> Self {
        self.windows_per_wave = windows_per_wave;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_window_step(mut self, window_step_secs: i64) -> Self {
        self.window_step_secs = window_step_secs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_empty_wave_limit(mut self, empty_wave_limit: u32) -> Self {
        self.empty_wave_limit = empty_wave_limit;
        self
    }

    pub fn with_termination_policy(mut self, policy: TerminationPolicy) -> Self {
        self.termination_policy = policy;
        self
    }

    pub fn with_start_time(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

/// Result of fetching one window.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The request succeeded; `matches` holds the scrobbles by watched artists.
    Fetched {
        window: FetchWindow,
        raw_count: usize,
        matches: Vec<ScrobbleRecord>,
    },
    /// The request failed. Treated as an empty window.
    Failed {
        window: FetchWindow,
        error: VibegenError,
    },
    /// Cancellation was requested before the request was issued.
    Skipped { window: FetchWindow },
}

/// Dedup store for history results.
///
/// Keeps the first record seen for each [`TrackKey`], in insertion order.
#[derive(Debug, Default)]
pub struct TrackCollector {
    seen: HashSet<TrackKey>,
    tracks: Vec<ScrobbleRecord>,
}

impl TrackCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; returns `false` if its key was already present.
    pub fn insert(&mut self, record: ScrobbleRecord) -> bool {
        if self.seen.insert(record.key()) {
            self.tracks.push(record);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[ScrobbleRecord] {
        &self.tracks
    }

    pub fn into_tracks(self) -> Vec<ScrobbleRecord> {
        self.tracks
    }
}

/// What one wave contributed after merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaveSummary {
    pub batches: usize,
    pub failed_batches: usize,
    pub skipped_batches: usize,
    pub raw_entries: usize,
    pub new_tracks: usize,
}

impl WaveSummary {
    /// Whether this wave counts toward the empty-wave limit under `policy`.
    pub fn is_empty_under(&self, policy: TerminationPolicy) -> bool {
        match policy {
            TerminationPolicy::NoNewMatches => self.new_tracks == 0,
            TerminationPolicy::UpstreamExhausted => self.raw_entries == 0,
        }
    }
}

/// Outcome of a complete history fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub user: UserHandle,
    /// Unique matching scrobbles in discovery order
    pub tracks: Vec<ScrobbleRecord>,
    pub waves: u32,
    pub batches: usize,
    pub failed_batches: usize,
    /// Whether the fetch stopped early because of cancellation
    pub cancelled: bool,
}

/// Walks a user's history backwards and collects scrobbles by watched artists.
pub struct HistoryFetcher<H> {
    source: H,
    config: FetchConfig,
    events: Option<EventBroadcaster>,
    cancel: CancellationState,
}

impl<H: HistorySource> HistoryFetcher<H> {
    pub fn new(source: H, config: FetchConfig) -> Self {
        Self {
            source,
            config,
            events: None,
            cancel: CancellationState::new(),
        }
    }

    pub fn with_events(mut self, events: EventBroadcaster) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationState) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn source(&self) -> &H {
        &self.source
    }

    /// Fetch the unique scrobbles of `handle` whose artist matches `watched`.
    ///
    /// Failing to resolve the user is the only fatal error; failed windows are
    /// logged and treated as empty.
    pub async fn fetch(&self, handle: &str, watched: &WatchedArtistSet) -> Result<FetchReport> {
        let user = self.source.get_user(handle).await?;
        log::info!(
            "Fetching history of '{}' for {} artist(s)",
            user.name,
            watched.len()
        );

        let windows_per_wave = self.config.windows_per_wave.max(1);
        let workers = self.config.max_workers.max(1);
        let step = self.config.window_step_secs.max(1);
        let mut cursor = self
            .config
            .start_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        let mut collector = TrackCollector::new();
        let mut report = FetchReport {
            user,
            tracks: Vec::new(),
            waves: 0,
            batches: 0,
            failed_batches: 0,
            cancelled: false,
        };
        let mut empty_waves = 0;

        while cursor > 0 {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let mut windows = Vec::with_capacity(windows_per_wave);
            while windows.len() < windows_per_wave && cursor > 0 {
                windows.push(FetchWindow {
                    time_to: cursor,
                    batch_size: self.config.batch_size,
                });
                cursor = cursor.saturating_sub(step);
            }
            let oldest_time_to = windows.last().map(|w| w.time_to).unwrap_or(cursor);

            let outcomes: Vec<BatchOutcome> = stream::iter(windows)
                .map(|window| self.fetch_window(&report.user, window, watched))
                .buffer_unordered(workers)
                .collect()
                .await;

            let summary = merge_wave(&mut collector, outcomes);
            report.waves += 1;
            report.batches += summary.batches;
            report.failed_batches += summary.failed_batches;

            log::debug!(
                "Wave {}: {} batches ({} failed), {} raw scrobbles, {} new tracks",
                report.waves,
                summary.batches,
                summary.failed_batches,
                summary.raw_entries,
                summary.new_tracks
            );

            if let Some(events) = &self.events {
                events.broadcast_event(ProgressEvent::WaveCompleted {
                    timestamp: chrono::Utc::now(),
                    wave: report.waves,
                    batches: summary.batches,
                    failed_batches: summary.failed_batches,
                    new_tracks: summary.new_tracks,
                    total_tracks: collector.len(),
                    oldest_time_to,
                });
            }

            if summary.skipped_batches > 0 {
                report.cancelled = true;
                break;
            }

            if summary.is_empty_under(self.config.termination_policy) {
                empty_waves += 1;
                if empty_waves >= self.config.empty_wave_limit {
                    log::debug!("Stopping after {empty_waves} consecutive empty waves");
                    break;
                }
            } else {
                empty_waves = 0;
            }
        }

        if report.cancelled {
            log::warn!("History fetch cancelled after {} waves", report.waves);
        }

        report.tracks = collector.into_tracks();
        log::info!(
            "Found {} unique tracks in {} waves",
            report.tracks.len(),
            report.waves
        );
        Ok(report)
    }

    async fn fetch_window(
        &self,
        user: &UserHandle,
        window: FetchWindow,
        watched: &WatchedArtistSet,
    ) -> BatchOutcome {
        if self.cancel.is_cancelled() {
            return BatchOutcome::Skipped { window };
        }

        match self
            .source
            .get_recent_tracks(user, window.batch_size, window.time_to)
            .await
        {
            Ok(records) => {
                let raw_count = records.len();
                let matches = records
                    .into_iter()
                    .filter(|record| watched.matches(&record.artist))
                    .collect();
                BatchOutcome::Fetched {
                    window,
                    raw_count,
                    matches,
                }
            }
            Err(error) => {
                log::warn!(
                    "History batch before {} failed, treating as empty: {}",
                    window.time_to,
                    error
                );
                BatchOutcome::Failed { window, error }
            }
        }
    }
}

/// Fold a drained wave into the collector, in the order the outcomes arrived.
pub fn merge_wave(collector: &mut TrackCollector, outcomes: Vec<BatchOutcome>) -> WaveSummary {
    let mut summary = WaveSummary::default();
    for outcome in outcomes {
        summary.batches += 1;
        match outcome {
            BatchOutcome::Fetched {
                raw_count, matches, ..
            } => {
                summary.raw_entries += raw_count;
                for record in matches {
                    if collector.insert(record) {
                        summary.new_tracks += 1;
                    }
                }
            }
            BatchOutcome::Failed { .. } => summary.failed_batches += 1,
            BatchOutcome::Skipped { .. } => summary.skipped_batches += 1,
        }
    }
    summary
}
