// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use crate::db::files;

/// Application configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Callback URL registered with Strava
    pub strava_redirect_uri: String,
    /// Scopes requested during authorization
    pub strava_scope: String,
    /// HMAC key for the OAuth `state` parameter (raw bytes)
    pub oauth_state_key: Vec<u8>,
    /// Persisted credential file
    pub token_path: PathBuf,
    /// Persisted activity cache file
    pub activity_cache_path: PathBuf,
    /// How many recent activities a sync or listing looks at
    pub activity_limit: u32,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

const DEFAULT_PORT: u16 = 10000;
const DEFAULT_ACTIVITY_LIMIT: u32 = 200;
const DEFAULT_SCOPE: &str = "activity:read_all";

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_redirect_uri: format!("http://localhost:{}/callback", DEFAULT_PORT),
            strava_scope: DEFAULT_SCOPE.to_string(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            token_path: PathBuf::from(files::TOKEN),
            activity_cache_path: PathBuf::from(files::ACTIVITY_CACHE),
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            frontend_url: "http://localhost:5173".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local use.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = parse_or("PORT", DEFAULT_PORT)?;
        let strava_client_secret = env::var("STRAVA_CLIENT_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?;

        // Fall back to the client secret so a minimal setup still signs state.
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|_| strava_client_secret.clone())
            .into_bytes();

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret,
            strava_redirect_uri: env::var("STRAVA_REDIRECT_URI")
                .unwrap_or_else(|_| format!("http://localhost:{}/callback", port)),
            strava_scope: env::var("STRAVA_SCOPE").unwrap_or_else(|_| DEFAULT_SCOPE.to_string()),
            oauth_state_key,
            token_path: env::var("TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(files::TOKEN)),
            activity_cache_path: env::var("ACTIVITY_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(files::ACTIVITY_CACHE)),
            activity_limit: parse_or("ACTIVITY_LIMIT", DEFAULT_ACTIVITY_LIMIT)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port,
        })
    }
}

/// Parse an optional numeric variable, rejecting values that are set but invalid.
fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
