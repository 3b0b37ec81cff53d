use crate::history::FetchConfig;
use crate::retry::RetryConfig;
use crate::search::SearchConfig;
use crate::{Result, VibegenError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// API credentials, read from the environment.
///
/// The Spotify token is an OAuth access token obtained elsewhere with the
/// `playlist-modify-private playlist-modify-public` scopes.
#[derive(Clone)]
pub struct Credentials {
    pub lastfm_api_key: String,
    pub spotify_access_token: String,
}

impl Credentials {
    pub const LASTFM_API_KEY: &'static str = "LASTFM_API_KEY";
    pub const SPOTIFY_ACCESS_TOKEN: &'static str = "SPOTIFY_ACCESS_TOKEN";

    /// Read `LASTFM_API_KEY` and `SPOTIFY_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from any key lookup; empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| VibegenError::Config(format!("{key} environment variable not set")))
        };

        Ok(Self {
            lastfm_api_key: required(Self::LASTFM_API_KEY)?,
            spotify_access_token: required(Self::SPOTIFY_ACCESS_TOKEN)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("lastfm_api_key", &"<redacted>")
            .field("spotify_access_token", &"<redacted>")
            .finish()
    }
}

/// Tunables loaded from `settings.json`.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fetch: FetchConfig,
    pub search: SearchConfig,
    pub retry: RetryConfig,
    pub lastfm_base_url: Option<String>,
    pub spotify_base_url: Option<String>,
    /// Market for top-track lookups
    pub spotify_market: String,
    /// Create public instead of private playlists
    pub public_playlist: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
            lastfm_base_url: None,
            spotify_base_url: None,
            spotify_market: "US".to_string(),
            public_playlist: false,
        }
    }
}

impl Settings {
    /// Default settings location: `~/.config/vibegen/settings.json` on Linux.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            VibegenError::Config("Cannot determine user config directory".to_string())
        })?;
        Ok(config_dir.join("vibegen").join("settings.json"))
    }

    /// Load settings from `path`, or defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)?;
        let settings = Self::from_json(&json).map_err(|e| {
            VibegenError::Config(format!("Invalid settings file {}: {e}", path.display()))
        })?;
        log::debug!("Settings loaded from: {}", path.display());
        Ok(settings)
    }

    /// Load settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TerminationPolicy;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings = Settings::from_json(
            r#"{"fetch": {"max_workers": 2, "termination_policy": "upstream-exhausted"}}"#,
        )
        .unwrap();

        assert_eq!(settings.fetch.max_workers, 2);
        assert_eq!(settings.fetch.windows_per_wave, 24);
        assert_eq!(
            settings.fetch.termination_policy,
            TerminationPolicy::UpstreamExhausted
        );
        assert_eq!(settings.search, SearchConfig::default());
        assert!(!settings.public_playlist);
    }

    #[test]
    fn test_settings_roundtrip() {
        let settings = Settings {
            public_playlist: true,
            ..Settings::default()
        };
        let restored = Settings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(settings, restored);
    }

    #[test]
    fn test_missing_settings_file() {
        let path = std::env::temp_dir().join("vibegen-does-not-exist").join("settings.json");
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_settings_file() {
        let dir = std::env::temp_dir().join(format!("vibegen-settings-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let result = Settings::load_from(&path);
        assert!(matches!(result, Err(VibegenError::Config(_))));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_credentials_lookup() {
        let creds = Credentials::from_lookup(|key| match key {
            "LASTFM_API_KEY" => Some("key".to_string()),
            "SPOTIFY_ACCESS_TOKEN" => Some(" token ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.lastfm_api_key, "key");
        assert_eq!(creds.spotify_access_token, "token");
        assert!(!format!("{creds:?}").contains("\"key\""));

        let missing = Credentials::from_lookup(|key| match key {
            "LASTFM_API_KEY" => Some("key".to_string()),
            _ => Some("   ".to_string()),
        });
        assert!(matches!(missing, Err(VibegenError::Config(_))));
    }
}
