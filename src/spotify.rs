use crate::cancel::CancellationState;
use crate::retry::{retry_operation, RetryConfig};
use crate::types::{CatalogArtist, CatalogTrack, Playlist};
use crate::{Result, VibegenError};
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::Deserialize;
use std::sync::Arc;

/// Spotify accepts at most this many tracks per add-to-playlist call.
pub const MAX_TRACKS_PER_REQUEST: usize = 100;

// =============================================================================
// CatalogService trait and Spotify implementation
// =============================================================================

/// A track catalog with playlist support.
///
/// Authentication happens outside this crate; implementations are handed an
/// already authorized client.
///
/// When the `mock` feature is enabled, `MockCatalogService` implements this
/// trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait CatalogService {
    /// Id of the account the client is authorized as.
    async fn current_user_id(&self) -> Result<String>;

    /// Run a track search and return up to `limit` candidates in service order.
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>>;

    /// Run an artist search and return up to `limit` candidates in service order.
    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<CatalogArtist>>;

    /// The artist's most popular tracks, most popular first.
    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<CatalogTrack>>;

    async fn create_playlist(&self, owner_id: &str, name: &str, public: bool)
        -> Result<Playlist>;

    /// Append tracks to a playlist. Callers must respect [`MAX_TRACKS_PER_REQUEST`].
    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String])
        -> Result<()>;
}

#[async_trait(?Send)]
impl<T: CatalogService + ?Sized> CatalogService for &T {
    async fn current_user_id(&self) -> Result<String> {
        (**self).current_user_id().await
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>> {
        (**self).search_tracks(query, limit).await
    }

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<CatalogArtist>> {
        (**self).search_artists(query, limit).await
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<CatalogTrack>> {
        (**self).artist_top_tracks(artist_id).await
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> Result<Playlist> {
        (**self).create_playlist(owner_id, name, public).await
    }

    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        (**self).add_tracks_to_playlist(playlist_id, track_ids).await
    }
}

#[async_trait(?Send)]
impl<T: CatalogService + ?Sized> CatalogService for Box<T> {
    async fn current_user_id(&self) -> Result<String> {
        (**self).current_user_id().await
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>> {
        (**self).search_tracks(query, limit).await
    }

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<CatalogArtist>> {
        (**self).search_artists(query, limit).await
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<CatalogTrack>> {
        (**self).artist_top_tracks(artist_id).await
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> Result<Playlist> {
        (**self).create_playlist(owner_id, name, public).await
    }

    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        (**self).add_tracks_to_playlist(playlist_id, track_ids).await
    }
}

/// [`CatalogService`] backed by the Spotify Web API.
///
/// Expects an OAuth access token carrying the `playlist-modify-private` and
/// `playlist-modify-public` scopes.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<dyn HttpClient + Send + Sync>,
    access_token: String,
    base_url: String,
    market: String,
    retry_config: RetryConfig,
    cancel: Option<CancellationState>,
}

impl SpotifyClient {
    pub fn new(client: Box<dyn HttpClient + Send + Sync>, access_token: String) -> Self {
        Self::with_base_url(
            client,
            access_token,
            "https://api.spotify.com/v1".to_string(),
        )
    }

    pub fn with_base_url(
        client: Box<dyn HttpClient + Send + Sync>,
        access_token: String,
        base_url: String,
    ) -> Self {
        Self {
            client: Arc::from(client),
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
            market: "US".to_string(),
            retry_config: RetryConfig::default(),
            cancel: None,
        }
    }

    /// Market used for top-track lookups (an ISO 3166-1 alpha-2 code).
    pub fn with_market(mut self, market: &str) -> Self {
        self.market = market.to_string();
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Abort rate-limit waits once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationState) -> Self {
        self.cancel = Some(cancel);
        self
    }

    async fn get(&self, path_and_query: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path_and_query);
        retry_operation(&self.retry_config, path_and_query, self.cancel.as_ref(), || {
            self.send_once(Method::Get, &url, None)
        })
        .await
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let body = body.to_string();
        retry_operation(&self.retry_config, path, self.cancel.as_ref(), || {
            self.send_once(Method::Post, &url, Some(body.clone()))
        })
        .await
    }

    async fn send_once(&self, method: Method, url: &str, body: Option<String>) -> Result<String> {
        let parsed = url
            .parse::<Url>()
            .map_err(|e| VibegenError::Http(format!("Invalid URL {url}: {e}")))?;
        let method_name = method.to_string();
        let mut request = Request::new(method, parsed);
        let _ = request.insert_header(
            "Authorization",
            format!("Bearer {}", self.access_token).as_str(),
        );
        if let Some(body) = body {
            let _ = request.insert_header("Content-Type", "application/json");
            request.set_body(body);
        }

        let mut response = self
            .client
            .send(request)
            .await
            .map_err(|e| VibegenError::Http(e.to_string()))?;

        if response.status() == 429 {
            let retry_after = response
                .header("retry-after")
                .and_then(|h| h.get(0))
                .and_then(|v| v.as_str().parse::<u64>().ok())
                .unwrap_or(30);
            return Err(VibegenError::RateLimit { retry_after });
        }

        let status: u16 = response.status().into();
        let text = response
            .body_string()
            .await
            .map_err(|e| VibegenError::Http(e.to_string()))?;

        log::debug!(
            "Spotify {method_name} {url}: {status} status, {} chars",
            text.len()
        );

        match status {
            200..=299 => Ok(text),
            401 => Err(VibegenError::Auth(parse_error_message(&text))),
            _ => Err(VibegenError::Api {
                status,
                message: parse_error_message(&text),
            }),
        }
    }
}

#[async_trait(?Send)]
impl CatalogService for SpotifyClient {
    async fn current_user_id(&self) -> Result<String> {
        let body = self.get("/me").await?;
        let profile: ApiProfile =
            serde_json::from_str(&body).map_err(|e| VibegenError::Parse(e.to_string()))?;
        Ok(profile.id)
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>> {
        let body = self
            .get(&format!(
                "/search?q={}&type=track&limit={}",
                urlencoding::encode(query),
                limit
            ))
            .await?;
        parse_track_search_response(&body)
    }

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<CatalogArtist>> {
        let body = self
            .get(&format!(
                "/search?q={}&type=artist&limit={}",
                urlencoding::encode(query),
                limit
            ))
            .await?;
        parse_artist_search_response(&body)
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<CatalogTrack>> {
        let body = self
            .get(&format!(
                "/artists/{}/top-tracks?market={}",
                urlencoding::encode(artist_id),
                urlencoding::encode(&self.market)
            ))
            .await?;
        parse_top_tracks_response(&body)
    }

    async fn create_playlist(
        &self,
        owner_id: &str,
        name: &str,
        public: bool,
    ) -> Result<Playlist> {
        let body = self
            .post(
                &format!("/users/{}/playlists", urlencoding::encode(owner_id)),
                serde_json::json!({ "name": name, "public": public }),
            )
            .await?;
        parse_playlist_response(&body)
    }

    async fn add_tracks_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        if track_ids.len() > MAX_TRACKS_PER_REQUEST {
            return Err(VibegenError::Api {
                status: 400,
                message: format!(
                    "{} tracks exceeds the limit of {MAX_TRACKS_PER_REQUEST} per request",
                    track_ids.len()
                ),
            });
        }
        let uris: Vec<String> = track_ids
            .iter()
            .map(|id| format!("spotify:track:{id}"))
            .collect();
        self.post(
            &format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)),
            serde_json::json!({ "uris": uris }),
        )
        .await?;
        Ok(())
    }
}

// =============================================================================
// Response parsing
// =============================================================================

#[derive(Deserialize)]
struct ApiProfile {
    id: String,
}

#[derive(Deserialize)]
struct ApiTrackSearchResponse {
    tracks: ApiPaging<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiArtistSearchResponse {
    artists: ApiPaging<ApiArtist>,
}

#[derive(Deserialize)]
struct ApiPaging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<Option<T>>,
}

#[derive(Deserialize)]
struct ApiTopTracksResponse {
    tracks: Vec<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiTrack {
    /// Local files have no id
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtistRef>,
}

#[derive(Deserialize)]
struct ApiArtistRef {
    name: String,
}

#[derive(Deserialize)]
struct ApiArtist {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct ApiPlaylist {
    id: String,
    #[serde(default)]
    external_urls: ApiExternalUrls,
}

#[derive(Deserialize, Default)]
struct ApiExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiErrorBody {
    Regular { message: String },
    // The accounts service answers with `{"error": "invalid_token", ...}`
    Code(String),
}

fn into_catalog_track(track: ApiTrack) -> Option<CatalogTrack> {
    let id = track.id?;
    let artist_name = track.artists.into_iter().next()?.name;
    Some(CatalogTrack {
        id,
        name: track.name,
        artist_name,
    })
}

pub fn parse_track_search_response(json: &str) -> Result<Vec<CatalogTrack>> {
    let response: ApiTrackSearchResponse =
        serde_json::from_str(json).map_err(|e| VibegenError::Parse(e.to_string()))?;
    Ok(response
        .tracks
        .items
        .into_iter()
        .flatten()
        .filter_map(into_catalog_track)
        .collect())
}

pub fn parse_artist_search_response(json: &str) -> Result<Vec<CatalogArtist>> {
    let response: ApiArtistSearchResponse =
        serde_json::from_str(json).map_err(|e| VibegenError::Parse(e.to_string()))?;
    Ok(response
        .artists
        .items
        .into_iter()
        .flatten()
        .map(|a| CatalogArtist {
            id: a.id,
            name: a.name,
        })
        .collect())
}

pub fn parse_top_tracks_response(json: &str) -> Result<Vec<CatalogTrack>> {
    let response: ApiTopTracksResponse =
        serde_json::from_str(json).map_err(|e| VibegenError::Parse(e.to_string()))?;
    Ok(response
        .tracks
        .into_iter()
        .filter_map(into_catalog_track)
        .collect())
}

pub fn parse_playlist_response(json: &str) -> Result<Playlist> {
    let playlist: ApiPlaylist =
        serde_json::from_str(json).map_err(|e| VibegenError::Parse(e.to_string()))?;
    Ok(Playlist {
        id: playlist.id,
        url: playlist.external_urls.spotify,
    })
}

/// Best-effort extraction of Spotify's error message; falls back to the raw body.
pub fn parse_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(ApiErrorResponse {
            error: ApiErrorBody::Regular { message },
        }) => message,
        Ok(ApiErrorResponse {
            error: ApiErrorBody::Code(code),
        }) => code,
        Err(_) => body.chars().take(200).collect(),
    }
}
