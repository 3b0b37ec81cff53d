use clap::{Parser, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use vibegen::{
    CancellationState, Credentials, LastFmApiClient, PlaylistRequest, ProgressEvent, Settings, SpotifyClient,
    TerminationPolicy, VibeGenerator,
};

/// Turn a Last.fm listening history into a Spotify playlist
#[derive(Parser)]
#[command(
    name = "vibegen",
    about = "Turn a Last.fm listening history into a Spotify playlist",
    long_about = None
)]
struct Cli {
    /// Last.fm user whose history is scanned
    username: String,

    /// Comma separated artists, e.g. "Daft Punk, Justice"
    #[arg(long)]
    artists: String,

    /// Name of the playlist to create
    #[arg(long)]
    playlist_name: String,

    /// Top tracks to add per artist (1-20)
    #[arg(long, default_value_t = 10)]
    top_tracks: usize,

    /// Only add tracks from the listening history
    #[arg(long, conflicts_with = "top_tracks")]
    no_top_tracks: bool,

    /// When to stop walking back through the history
    #[arg(long, value_enum)]
    termination_policy: Option<Termination>,

    /// Concurrent history requests
    #[arg(long)]
    workers: Option<usize>,

    /// Collect and match tracks without creating a playlist
    #[arg(long)]
    dry_run: bool,

    /// Show detailed debug information
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Termination {
    /// Stop after waves that add no new matching tracks
    NoNewMatches,
    /// Stop only after waves that return no scrobbles at all
    UpstreamExhausted,
}

impl From<Termination> for TerminationPolicy {
    fn from(value: Termination) -> Self {
        match value {
            Termination::NoNewMatches => TerminationPolicy::NoNewMatches,
            Termination::UpstreamExhausted => TerminationPolicy::UpstreamExhausted,
        }
    }
}

fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::WaveCompleted {
            wave,
            failed_batches,
            new_tracks,
            total_tracks,
            oldest_time_to,
            ..
        } => {
            let reached = chrono::DateTime::from_timestamp(*oldest_time_to, 0)
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| oldest_time_to.to_string());
            println!(
                "📜 Wave {wave}: back to {reached}, +{new_tracks} tracks ({total_tracks} total, {failed_batches} failed batches)"
            );
        }
        ProgressEvent::TrackSearched {
            completed,
            total,
            title,
            artist,
            found,
            ..
        } => {
            let mark = if *found { "✅" } else { "❌" };
            println!("{mark} [{completed}/{total}] {artist} - {title}");
        }
        ProgressEvent::ChunkSubmitted {
            completed,
            total,
            success,
            ..
        } => {
            let mark = if *success { "➕" } else { "⚠️" };
            println!("{mark} Submitted {completed}/{total} tracks");
        }
        ProgressEvent::RunFinished { .. } => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let credentials = match Credentials::from_env() {
        Ok(creds) => creds,
        Err(e) => {
            eprintln!("❌ Error: {e}");
            eprintln!();
            eprintln!("Please set the following environment variables:");
            eprintln!("  {}=your_lastfm_api_key", Credentials::LASTFM_API_KEY);
            eprintln!(
                "  {}=spotify_oauth_token_with_playlist_scopes",
                Credentials::SPOTIFY_ACCESS_TOKEN
            );
            std::process::exit(1);
        }
    };

    let mut settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load settings: {e}");
            std::process::exit(1);
        }
    };
    if let Some(policy) = args.termination_policy {
        settings.fetch.termination_policy = policy.into();
    }
    if let Some(workers) = args.workers {
        settings.fetch.max_workers = workers;
    }

    let request = PlaylistRequest::new(&args.username, &args.artists, &args.playlist_name)
        .and_then(|request| {
            if args.no_top_tracks {
                Ok(request.without_top_tracks())
            } else {
                request.with_top_tracks(args.top_tracks)
            }
        });
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let cancel = CancellationState::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("⏹️  Stopping history fetch, keeping what was found so far");
            on_interrupt.cancel();
        }
    });

    let history_http = Box::new(http_client::native::NativeClient::new());
    let history = match &settings.lastfm_base_url {
        Some(base_url) => {
            LastFmApiClient::with_base_url(history_http, credentials.lastfm_api_key, base_url.clone())
        }
        None => LastFmApiClient::new(history_http, credentials.lastfm_api_key),
    }
    .with_retry_config(settings.retry.clone())
    .with_cancellation(cancel.clone());

    let catalog_http = Box::new(http_client::native::NativeClient::new());
    let catalog = match &settings.spotify_base_url {
        Some(base_url) => SpotifyClient::with_base_url(
            catalog_http,
            credentials.spotify_access_token,
            base_url.clone(),
        ),
        None => SpotifyClient::new(catalog_http, credentials.spotify_access_token),
    }
    .with_market(&settings.spotify_market)
    .with_retry_config(settings.retry.clone())
    .with_cancellation(cancel.clone());

    let generator = VibeGenerator::new(history, catalog)
        .with_fetch_config(settings.fetch.clone())
        .with_search_config(settings.search.clone())
        .with_public_playlist(settings.public_playlist)
        .with_cancellation(cancel);

    let mut events = generator.events().subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ProgressEvent::RunFinished { .. }) => break,
                Ok(event) => print_progress(&event),
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("Progress display skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if args.dry_run {
        let collected = match generator.collect(&request).await {
            Ok(collected) => collected,
            Err(e) => {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
        };
        printer.abort();

        println!(
            "🔎 {} history tracks, {} matched, {} not found, {} failed, {} top tracks",
            collected.fetch.tracks.len(),
            collected.matches.found.len(),
            collected.matches.not_found.len(),
            collected.matches.failed.len(),
            collected.top_tracks.len()
        );
        println!("🎵 {} tracks would be added (dry run)", collected.tracks.len());
        return Ok(());
    }

    let summary = match generator.generate(&request).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };
    let _ = printer.await;

    println!(
        "🎵 {} tracks found, {} added",
        summary.tracks_found(),
        summary.tracks_added()
    );
    match summary.publish.as_ref().map(|p| &p.playlist) {
        Some(playlist) => match &playlist.url {
            Some(url) => println!("🔗 {url}"),
            None => println!("🔗 Playlist id {}", playlist.id),
        },
        None => println!("No playlist created"),
    }

    Ok(())
}
