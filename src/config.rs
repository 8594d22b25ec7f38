//! Engine configuration loaded from environment variables.
//!
//! All values are read once at startup. The OAuth client secret is the
//! only sensitive value; it comes from the environment (or a `.env` file
//! in local development).

use std::env;

/// Engine configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote inventory API
    pub api_base_url: String,
    /// API key sent with every request (`X-API-Key`)
    pub api_key: String,
    /// OAuth client ID (public)
    pub oauth_client_id: String,
    /// OAuth client secret
    pub oauth_client_secret: String,
    /// Poll tick interval in seconds
    pub poll_interval_secs: u64,
    /// Staleness threshold in seconds before a poll tick re-fetches
    pub staleness_secs: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| "https://www.bungie.net/Platform".to_string()),
            api_key: env::var("API_KEY").map_err(|_| ConfigError::Missing("API_KEY"))?,
            oauth_client_id: env::var("OAUTH_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("OAUTH_CLIENT_ID"))?,
            oauth_client_secret: env::var("OAUTH_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("OAUTH_CLIENT_SECRET"))?,
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            staleness_secs: env::var("STALENESS_SECS")
                .unwrap_or_else(|_| "35".to_string())
                .parse()
                .unwrap_or(35),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            api_base_url: "http://localhost:9999/Platform".to_string(),
            api_key: "test_api_key".to_string(),
            oauth_client_id: "test_client_id".to_string(),
            oauth_client_secret: "test_secret".to_string(),
            poll_interval_secs: 2,
            staleness_secs: 35,
        }
    }

    /// Build the OAuth authorization URL the surrounding app should open.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/oauth/authorize?client_id={}&response_type=code&redirect_uri={}&state={}",
            self.api_base_url,
            self.oauth_client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
