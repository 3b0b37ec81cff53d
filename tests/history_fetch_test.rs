mod common;

use common::{drain_events, scrobble, FakeHistory};
use vibegen::{
    CancellationState, EventBroadcaster, FetchConfig, HistoryFetcher, ProgressEvent,
    TerminationPolicy, VibegenError, WatchedArtistSet,
};

fn sequential_config(start_time: i64, step: i64, windows_per_wave: usize) -> FetchConfig {
    FetchConfig::new()
        .with_start_time(start_time)
        .with_window_step(step)
        .with_windows_per_wave(windows_per_wave)
        .with_max_workers(1)
        .with_batch_size(1000)
}

fn watched(names: &str) -> WatchedArtistSet {
    WatchedArtistSet::from_comma_separated(names)
}

#[test_log::test(tokio::test)]
async fn test_keeps_first_occurrence_of_each_track() {
    let history = FakeHistory::new("rj").with_scrobbles(vec![
        scrobble("One More Time", "Daft Punk", 900),
        scrobble("one more time!", "daft punk", 500),
        scrobble("D.A.N.C.E.", "Justice", 400),
        scrobble("Intro", "The xx", 300),
    ]);
    let fetcher = HistoryFetcher::new(&history, sequential_config(1000, 100, 4));

    let report = fetcher
        .fetch("rj", &watched("Daft Punk, Justice"))
        .await
        .unwrap();

    assert_eq!(report.tracks.len(), 2);
    assert_eq!(report.tracks[0].title, "One More Time");
    assert_eq!(report.tracks[0].timestamp, 900);
    assert_eq!(report.tracks[1].artist, "Justice");
    assert!(!report.cancelled);
}

#[test_log::test(tokio::test)]
async fn test_stops_when_history_is_exhausted() {
    let history = FakeHistory::new("rj").with_scrobbles(vec![scrobble("Song", "Daft Punk", 50)]);
    let fetcher = HistoryFetcher::new(
        &history,
        sequential_config(100, 30, 2).with_termination_policy(TerminationPolicy::UpstreamExhausted),
    );

    let report = fetcher.fetch("rj", &watched("Daft Punk")).await.unwrap();

    assert_eq!(history.calls(), vec![100, 70, 40, 10]);
    assert_eq!(report.waves, 2);
    assert_eq!(report.batches, 4);
    assert_eq!(report.tracks.len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_empty_watched_set_terminates_under_no_new_matches() {
    let history = FakeHistory::new("rj").with_scrobbles(
        (0..50)
            .map(|i| scrobble(&format!("Song {i}"), "Someone Else", 999_000 + i))
            .collect(),
    );
    let fetcher = HistoryFetcher::new(&history, sequential_config(1_000_000, 10, 2));

    let report = fetcher
        .fetch("rj", &WatchedArtistSet::default())
        .await
        .unwrap();

    assert!(report.tracks.is_empty());
    assert_eq!(report.waves, 3);
    assert_eq!(history.calls().len(), 6);
}

#[test_log::test(tokio::test)]
async fn test_upstream_exhausted_keeps_going_while_scrobbles_arrive() {
    let scrobbles = vec![
        scrobble("A", "Someone Else", 999_995),
        scrobble("B", "Someone Else", 999_975),
    ];

    let no_new_matches = FakeHistory::new("rj").with_scrobbles(scrobbles.clone());
    let report = HistoryFetcher::new(&no_new_matches, sequential_config(1_000_000, 10, 2))
        .fetch("rj", &watched("Daft Punk"))
        .await
        .unwrap();
    assert_eq!(report.waves, 3);

    // Waves 1 and 2 still see raw scrobbles, so only waves 3 to 5 count as empty.
    let upstream = FakeHistory::new("rj").with_scrobbles(scrobbles);
    let report = HistoryFetcher::new(
        &upstream,
        sequential_config(1_000_000, 10, 2)
            .with_termination_policy(TerminationPolicy::UpstreamExhausted),
    )
    .fetch("rj", &watched("Daft Punk"))
    .await
    .unwrap();
    assert_eq!(report.waves, 5);
    assert!(report.tracks.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_empty_watched_set_terminates_under_upstream_exhausted() {
    let history = FakeHistory::new("rj").with_scrobbles(vec![scrobble("A", "Someone", 99_500)]);
    let fetcher = HistoryFetcher::new(
        &history,
        sequential_config(100_000, 1000, 4)
            .with_termination_policy(TerminationPolicy::UpstreamExhausted),
    );

    let report = fetcher
        .fetch("rj", &WatchedArtistSet::default())
        .await
        .unwrap();

    assert!(report.tracks.is_empty());
    assert_eq!(report.waves, 4);
}

#[test_log::test(tokio::test)]
async fn test_failed_window_is_not_fatal() {
    let history = FakeHistory::new("rj")
        .with_scrobbles(vec![
            scrobble("One More Time", "Daft Punk", 950),
            scrobble("Genesis", "Justice", 850),
        ])
        .with_failing_window(1000);
    let fetcher = HistoryFetcher::new(&history, sequential_config(1000, 100, 4));

    let report = fetcher
        .fetch("rj", &watched("Daft Punk, Justice"))
        .await
        .unwrap();

    assert_eq!(report.failed_batches, 1);
    // The window before 900 still returns Genesis; One More Time is only in
    // the failed window.
    let titles: Vec<&str> = report.tracks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Genesis"]);
}

#[test_log::test(tokio::test)]
async fn test_unknown_user_is_fatal() {
    let history = FakeHistory::new("rj");
    let fetcher = HistoryFetcher::new(&history, sequential_config(1000, 100, 4));

    let result = fetcher.fetch("nobody", &watched("Daft Punk")).await;

    assert!(matches!(result, Err(VibegenError::UnknownUser(name)) if name == "nobody"));
    assert!(history.calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_cancellation_returns_partial_results() {
    let cancel = CancellationState::new();
    let history = FakeHistory::new("rj")
        .with_scrobbles(vec![scrobble("Song", "Daft Punk", 950)])
        .cancel_after(1, cancel.clone());
    let fetcher =
        HistoryFetcher::new(&history, sequential_config(1000, 100, 4)).with_cancellation(cancel);

    let report = fetcher.fetch("rj", &watched("Daft Punk")).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(history.calls(), vec![1000]);
    assert_eq!(report.waves, 1);
    assert_eq!(report.tracks.len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_cancelled_before_start() {
    let cancel = CancellationState::new();
    cancel.cancel();
    let history = FakeHistory::new("rj");
    let fetcher =
        HistoryFetcher::new(&history, sequential_config(1000, 100, 4)).with_cancellation(cancel);

    let report = fetcher.fetch("rj", &watched("Daft Punk")).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.waves, 0);
    assert!(history.calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_concurrent_workers_never_duplicate_tracks() {
    let scrobbles: Vec<_> = (0..40)
        .map(|i| scrobble(&format!("Track {i}"), "Daft Punk", 10_000 - i * 200))
        .collect();
    let history = FakeHistory::new("rj").with_scrobbles(scrobbles);
    let config = FetchConfig::new()
        .with_start_time(10_000)
        .with_window_step(500)
        .with_windows_per_wave(6)
        .with_max_workers(4)
        .with_batch_size(3);

    let report = HistoryFetcher::new(&history, config)
        .fetch("rj", &watched("Daft Punk"))
        .await
        .unwrap();

    let mut titles: Vec<String> = report.tracks.iter().map(|t| t.title.clone()).collect();
    titles.sort();
    titles.dedup();
    assert_eq!(titles.len(), report.tracks.len());
    assert_eq!(history.calls().len(), 20);
}

#[test_log::test(tokio::test)]
async fn test_wave_events() {
    let events = EventBroadcaster::new();
    let mut receiver = events.subscribe();
    let history = FakeHistory::new("rj").with_scrobbles(vec![scrobble("Song", "Daft Punk", 50)]);
    let fetcher = HistoryFetcher::new(&history, sequential_config(100, 30, 2)).with_events(events);

    fetcher.fetch("rj", &watched("Daft Punk")).await.unwrap();

    let waves: Vec<(u32, usize, i64)> = drain_events(&mut receiver)
        .into_iter()
        .filter_map(|event| match event {
            ProgressEvent::WaveCompleted {
                wave,
                total_tracks,
                oldest_time_to,
                ..
            } => Some((wave, total_tracks, oldest_time_to)),
            _ => None,
        })
        .collect();
    assert_eq!(waves, vec![(1, 1, 70), (2, 1, 10)]);
}
