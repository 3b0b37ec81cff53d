use crate::types::CatalogTrack;
use std::collections::HashSet;

/// Ordered, id-deduplicated set of catalog tracks.
///
/// Tracks are kept in the order they were first added, so whatever is
/// added first wins: history matches go in before top tracks.
///
/// # Examples
///
/// ```rust
/// use vibegen::{CatalogTrack, TrackSetBuilder};
///
/// let a = CatalogTrack::new("1", "A", "X");
/// let b = CatalogTrack::new("2", "B", "X");
/// let c = CatalogTrack::new("3", "C", "X");
///
/// let tracks = TrackSetBuilder::new()
///     .with_tracks(vec![a.clone(), b.clone()])
///     .with_tracks(vec![b.clone(), c.clone()])
///     .build();
/// assert_eq!(tracks, vec![a, b, c]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TrackSetBuilder {
    seen_ids: HashSet<String>,
    tracks: Vec<CatalogTrack>,
}

impl TrackSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one track; returns `false` if its id is already present.
    pub fn push(&mut self, track: CatalogTrack) -> bool {
        if self.seen_ids.contains(&track.id) {
            return false;
        }
        self.seen_ids.insert(track.id.clone());
        self.tracks.push(track);
        true
    }

    /// Add several tracks, returning how many were new.
    pub fn extend<I: IntoIterator<Item = CatalogTrack>>(&mut self, tracks: I) -> usize {
        let mut added = 0;
        for track in tracks {
            if self.push(track) {
                added += 1;
            }
        }
        added
    }

    pub fn with_tracks<I: IntoIterator<Item = CatalogTrack>>(mut self, tracks: I) -> Self {
        self.extend(tracks);
        self
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn build(self) -> Vec<CatalogTrack> {
        self.tracks
    }
}

/// Merge history matches with optional top tracks, history first.
pub fn merge_tracks(history: Vec<CatalogTrack>, top_tracks: Vec<CatalogTrack>) -> Vec<CatalogTrack> {
    TrackSetBuilder::new()
        .with_tracks(history)
        .with_tracks(top_tracks)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, name: &str) -> CatalogTrack {
        CatalogTrack::new(id, name, "Artist")
    }

    #[test]
    fn test_history_before_top_tracks() {
        let merged = merge_tracks(
            vec![track("1", "A"), track("2", "B")],
            vec![track("2", "B"), track("3", "C")],
        );
        let ids: Vec<&str> = merged.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_first_seen_entry_wins() {
        let mut builder = TrackSetBuilder::new();
        assert!(builder.push(track("1", "History Version")));
        assert!(!builder.push(track("1", "Top Track Version")));
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.build()[0].name, "History Version");
    }

    #[test]
    fn test_duplicates_within_one_source() {
        let mut builder = TrackSetBuilder::new();
        let added = builder.extend(vec![track("1", "A"), track("1", "A"), track("2", "B")]);
        assert_eq!(added, 2);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(merge_tracks(Vec::new(), Vec::new()).is_empty());
        assert!(TrackSetBuilder::new().is_empty());
    }
}
