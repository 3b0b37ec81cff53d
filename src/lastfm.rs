use crate::cancel::CancellationState;
use crate::retry::{retry_operation, RetryConfig};
use crate::types::{ScrobbleRecord, UserHandle};
use crate::{Result, VibegenError};
use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};
use serde::Deserialize;
use std::sync::Arc;

/// Last.fm caps `user.getrecenttracks` at this many entries per page.
pub const MAX_PAGE_SIZE: u32 = 200;

// =============================================================================
// HistorySource trait and Last.fm implementation
// =============================================================================

/// A source of listening history.
///
/// The seam the history fetcher talks to. Connection failures and unknown
/// users are reported as errors, distinct from an empty window which is an
/// `Ok` with no records.
///
/// When the `mock` feature is enabled, `MockHistorySource` implements this
/// trait using the `mockall` library.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait HistorySource {
    /// Resolve a user name into a handle.
    async fn get_user(&self, handle: &str) -> Result<UserHandle>;

    /// Fetch up to `limit` scrobbles played strictly before `time_to`, newest first.
    async fn get_recent_tracks(
        &self,
        user: &UserHandle,
        limit: u32,
        time_to: i64,
    ) -> Result<Vec<ScrobbleRecord>>;
}

#[async_trait(?Send)]
impl<T: HistorySource + ?Sized> HistorySource for &T {
    async fn get_user(&self, handle: &str) -> Result<UserHandle> {
        (**self).get_user(handle).await
    }

    async fn get_recent_tracks(
        &self,
        user: &UserHandle,
        limit: u32,
        time_to: i64,
    ) -> Result<Vec<ScrobbleRecord>> {
        (**self).get_recent_tracks(user, limit, time_to).await
    }
}

#[async_trait(?Send)]
impl<T: HistorySource + ?Sized> HistorySource for Box<T> {
    async fn get_user(&self, handle: &str) -> Result<UserHandle> {
        (**self).get_user(handle).await
    }

    async fn get_recent_tracks(
        &self,
        user: &UserHandle,
        limit: u32,
        time_to: i64,
    ) -> Result<Vec<ScrobbleRecord>> {
        (**self).get_recent_tracks(user, limit, time_to).await
    }
}

/// [`HistorySource`] backed by the public Last.fm JSON API.
#[derive(Clone)]
pub struct LastFmApiClient {
    client: Arc<dyn HttpClient + Send + Sync>,
    api_key: String,
    base_url: String,
    retry_config: RetryConfig,
    cancel: Option<CancellationState>,
}

impl LastFmApiClient {
    pub fn new(client: Box<dyn HttpClient + Send + Sync>, api_key: String) -> Self {
        Self::with_base_url(
            client,
            api_key,
            "https://ws.audioscrobbler.com/2.0/".to_string(),
        )
    }

    /// Create a client against a different API root, e.g. a local test server.
    pub fn with_base_url(
        client: Box<dyn HttpClient + Send + Sync>,
        api_key: String,
        base_url: String,
    ) -> Self {
        Self {
            client: Arc::from(client),
            api_key,
            base_url,
            retry_config: RetryConfig::default(),
            cancel: None,
        }
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

    fn method_url(&self, method: &str, params: &[(&str, String)]) -> String {
        let mut url = format!(
            "{}?method={}&api_key={}&format=json",
            self.base_url,
            method,
            urlencoding::encode(&self.api_key)
        );
        for (key, value) in params {
            url.push_str(&format!("&{key}={}", urlencoding::encode(value)));
        }
        url
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<String> {
        let url = self.method_url(method, params);
        retry_operation(&self.retry_config, method, self.cancel.as_ref(), || {
            self.call_once(&url)
        })
        .await
    }

    async fn call_once(&self, url: &str) -> Result<String> {
        let parsed = url
            .parse::<Url>()
            .map_err(|e| VibegenError::Http(format!("Invalid URL {url}: {e}")))?;
        let request = Request::new(Method::Get, parsed);

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
                .unwrap_or(60);
            return Err(VibegenError::RateLimit { retry_after });
        }

        let status: u16 = response.status().into();
        let body = response
            .body_string()
            .await
            .map_err(|e| VibegenError::Http(e.to_string()))?;

        log::debug!("Last.fm response: {} status, {} chars", status, body.len());

        check_api_error(&body)?;
        if !(200..300).contains(&status) {
            return Err(VibegenError::Api {
                status,
                message: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

#[async_trait(?Send)]
impl HistorySource for LastFmApiClient {
    async fn get_user(&self, handle: &str) -> Result<UserHandle> {
        let body = self
            .call("user.getinfo", &[("user", handle.to_string())])
            .await
            .map_err(|e| match e {
                VibegenError::Api { status: 6, .. } => {
                    VibegenError::UnknownUser(handle.to_string())
                }
                other => other,
            })?;
        parse_user_info_response(&body)
    }

    async fn get_recent_tracks(
        &self,
        user: &UserHandle,
        limit: u32,
        time_to: i64,
    ) -> Result<Vec<ScrobbleRecord>> {
        let page_size = limit.clamp(1, MAX_PAGE_SIZE);
        let mut records = Vec::new();
        let mut page = 1;

        while (records.len() as u32) < limit {
            let body = self
                .call(
                    "user.getrecenttracks",
                    &[
                        ("user", user.name.clone()),
                        ("limit", page_size.to_string()),
                        ("to", time_to.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            let parsed = parse_recent_tracks_response(&body)?;
            let received = parsed.records.len();
            records.extend(parsed.records);

            if received == 0 || parsed.page >= parsed.total_pages {
                break;
            }
            page += 1;
        }

        records.truncate(limit as usize);
        Ok(records)
    }
}

// =============================================================================
// Response parsing
// =============================================================================

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: u16,
    message: String,
}

/// Last.fm reports failures as `{"error": code, "message": ...}`, sometimes
/// with a 200 status.
fn check_api_error(body: &str) -> Result<()> {
    let Ok(error) = serde_json::from_str::<ApiErrorResponse>(body) else {
        return Ok(());
    };
    Err(match error.error {
        // Invalid API key / authentication failed / suspended key
        4 | 9 | 10 | 26 => VibegenError::Auth(error.message),
        29 => VibegenError::RateLimit { retry_after: 60 },
        code => VibegenError::Api {
            status: code,
            message: error.message,
        },
    })
}

#[derive(Deserialize)]
struct ApiUserInfoResponse {
    user: ApiUser,
}

#[derive(Deserialize)]
struct ApiUser {
    name: String,
    playcount: Option<String>,
    registered: Option<ApiRegistered>,
}

#[derive(Deserialize)]
struct ApiRegistered {
    #[serde(rename = "unixtime")]
    unix_time: String,
}

pub fn parse_user_info_response(json: &str) -> Result<UserHandle> {
    let response: ApiUserInfoResponse =
        serde_json::from_str(json).map_err(|e| VibegenError::Parse(e.to_string()))?;
    let user = response.user;

    Ok(UserHandle {
        name: user.name,
        playcount: user.playcount.and_then(|p| p.parse().ok()),
        registered: user.registered.and_then(|r| r.unix_time.parse().ok()),
    })
}

#[derive(Deserialize)]
struct ApiRecentTracksResponse {
    recenttracks: ApiRecentTracks,
}

#[derive(Deserialize)]
struct ApiRecentTracks {
    #[serde(default)]
    track: OneOrMany<ApiTrack>,
    #[serde(rename = "@attr")]
    attr: ApiPaginationAttr,
}

/// A single-entry page comes back as an object instead of a one-element array.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
struct ApiTrack {
    name: String,
    artist: ApiTextField,
    date: Option<ApiDate>,
    #[serde(rename = "@attr")]
    attr: Option<ApiTrackAttr>,
}

#[derive(Deserialize)]
struct ApiTextField {
    #[serde(rename = "#text")]
    text: String,
}

#[derive(Deserialize)]
struct ApiDate {
    uts: String,
}

#[derive(Deserialize)]
struct ApiTrackAttr {
    nowplaying: Option<String>,
}

#[derive(Deserialize)]
struct ApiPaginationAttr {
    page: String,
    #[serde(rename = "totalPages")]
    total_pages: String,
}

/// One parsed page of `user.getrecenttracks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTracksPage {
    pub records: Vec<ScrobbleRecord>,
    pub page: u32,
    pub total_pages: u32,
}

pub fn parse_recent_tracks_response(json: &str) -> Result<RecentTracksPage> {
    let response: ApiRecentTracksResponse =
        serde_json::from_str(json).map_err(|e| VibegenError::Parse(e.to_string()))?;

    let page: u32 = response.recenttracks.attr.page.parse().unwrap_or(1);
    let total_pages: u32 = response.recenttracks.attr.total_pages.parse().unwrap_or(0);

    let records = response
        .recenttracks
        .track
        .into_vec()
        .into_iter()
        .filter(|t| {
            // "Now playing" entries have no timestamp and would repeat in every window
            !matches!(
                t.attr.as_ref().and_then(|a| a.nowplaying.as_deref()),
                Some("true")
            )
        })
        .filter_map(|t| {
            let timestamp: i64 = t.date.as_ref()?.uts.parse().ok()?;
            Some(ScrobbleRecord {
                title: t.name,
                artist: t.artist.text,
                timestamp,
            })
        })
        .collect();

    Ok(RecentTracksPage {
        records,
        page,
        total_pages,
    })
}
