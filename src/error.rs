use thiserror::Error;

/// Error types for vibegen operations.
///
/// Covers both collaborators (Last.fm history and the Spotify catalog) plus the
/// local concerns of configuration and cancellation. Whether an error aborts a
/// run is decided by the caller: a failed history batch or a missed track
/// search is logged and skipped, while failing to resolve the Last.fm user or
/// to authenticate against Spotify ends the run.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// use vibegen::{HistorySource, LastFmApiClient, VibegenError};
///
/// #[tokio::main]
/// async fn main() {
///     let http_client = http_client::native::NativeClient::new();
///     let client = LastFmApiClient::new(Box::new(http_client), "api-key".to_string());
///
///     match client.get_user("someone").await {
///         Ok(user) => println!("Found {}", user.name),
///         Err(VibegenError::UnknownUser(name)) => eprintln!("No such user: {}", name),
///         Err(VibegenError::Http(msg)) => eprintln!("Network error: {}", msg),
///         Err(e) => eprintln!("Other error: {}", e),
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum VibegenError {
    /// HTTP/network related errors.
    ///
    /// Connection failures, timeouts, DNS errors and unreadable response bodies.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failures.
    ///
    /// Returned when an API key is rejected or a Spotify access token is
    /// missing, expired or lacks the playlist scopes.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The history source does not know the requested user.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Failed to parse a collaborator's response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Rate limiting from a collaborator.
    ///
    /// The `retry_after` field indicates how many seconds to wait before
    /// the next request attempt.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimit {
        /// Number of seconds to wait before retrying
        retry_after: u64,
    },

    /// A well-formed request the remote API refused.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code, or the service's own error code when it reports
        /// failures inside a 200 response
        status: u16,
        message: String,
    },

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation was cancelled through a [`CancellationState`](crate::CancellationState).
    #[error("Operation cancelled")]
    Cancelled,

    /// File system I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
