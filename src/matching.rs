//! Artist identity matching between Last.fm credits and user-supplied names.

use crate::normalize::normalize;
use std::collections::HashSet;

/// Decide whether two free-text artist names refer to the same artist.
///
/// Names are normalized first and equal forms match. Otherwise the names
/// match when the token set of one is contained in the other and at least one
/// of them has more than one token, which lets a collaboration credit such as
/// "Dimitri Vegas & Like Mike" match "Dimitri Vegas" while keeping "M" from
/// matching "Eminem". This trades some precision for recall: "The Killers"
/// also matches "Killers".
///
/// An empty name (after normalization) never matches, so two names made only
/// of punctuation do not match even though their normalized forms are equal.
pub fn artist_matches(candidate: &str, target: &str) -> bool {
    normalized_matches(&normalize(candidate), &normalize(target))
}

fn normalized_matches(candidate: &str, target: &str) -> bool {
    if candidate.is_empty() || target.is_empty() {
        return false;
    }
    if candidate == target {
        return true;
    }

    let candidate_tokens: HashSet<&str> = candidate.split(' ').collect();
    let target_tokens: HashSet<&str> = target.split(' ').collect();

    let multi_token = candidate_tokens.len() > 1 || target_tokens.len() > 1;
    multi_token
        && (candidate_tokens.is_subset(&target_tokens)
            || target_tokens.is_subset(&candidate_tokens))
}

/// A watched artist as typed by the user together with its normalized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedArtist {
    /// The name as supplied, trimmed
    pub display_name: String,
    /// Output of [`normalize`] for the name
    pub normalized: String,
}

/// The set of artists whose scrobbles should end up in the playlist.
///
/// Built once from user input and read-only afterwards. Entries that
/// normalize to nothing are dropped, as are duplicates of an earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchedArtistSet {
    artists: Vec<WatchedArtist>,
}

impl WatchedArtistSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut artists = Vec::new();
        for name in names {
            let display_name = name.as_ref().trim().to_string();
            let normalized = normalize(&display_name);
            if normalized.is_empty() || !seen.insert(normalized.clone()) {
                continue;
            }
            artists.push(WatchedArtist {
                display_name,
                normalized,
            });
        }
        Self { artists }
    }

    /// Parse a comma separated list such as `"Daft Punk, Justice"`.
    pub fn from_comma_separated(input: &str) -> Self {
        Self::new(input.split(','))
    }

    /// Whether `artist` matches any watched entry under [`artist_matches`].
    pub fn matches(&self, artist: &str) -> bool {
        let candidate = normalize(artist);
        self.artists
            .iter()
            .any(|watched| normalized_matches(&candidate, &watched.normalized))
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchedArtist> {
        self.artists.iter()
    }

    pub fn len(&self) -> usize {
        self.artists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}
