// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Authorization URL construction and code exchange
//! - Token refresh
//! - Activity listing, detail and stream fetching
//! - Rate limit / revoked token detection
//!
//! The client holds only the application's OAuth client credentials. The
//! athlete's access token is an explicit argument to every call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use crate::models::Credential;

const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";
const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest page Strava serves for list endpoints.
pub const MAX_PER_PAGE: u32 = 200;

/// Stream types served by the streams route.
pub const DEFAULT_STREAM_TYPES: &[&str] =
    &["time", "altitude", "velocity_smooth", "heartrate", "watts"];

/// Errors from Strava API calls, by kind.
#[derive(Debug, thiserror::Error)]
pub enum StravaError {
    #[error("Strava rate limit exceeded")]
    RateLimited,

    #[error("Strava rejected the credential")]
    Unauthorized,

    #[error("Strava HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Strava request failed: {0}")]
    Transport(String),

    #[error("Unexpected Strava response: {0}")]
    Decode(String),
}

impl StravaError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, StravaError::RateLimited)
    }
}

/// The Strava capabilities this service consumes.
#[async_trait]
pub trait StravaApi: Send + Sync {
    /// URL the athlete is sent to for consent.
    fn authorization_url(&self, redirect_uri: &str, scope: &str, state: &str) -> String;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, StravaError>;

    /// Exchange a refresh token for a new token set.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, StravaError>;

    /// Most recent activities first, up to `limit`.
    async fn list_activity_summaries(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<StravaActivitySummary>, StravaError>;

    async fn get_activity_detail(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, StravaError>;

    /// Stream data keyed by stream type.
    async fn get_activity_streams(
        &self,
        access_token: &str,
        activity_id: u64,
        types: &[&str],
    ) -> Result<ActivityStreams, StravaError>;
}

/// Strava API client over reqwest.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            http,
            base_url: STRAVA_API_BASE.to_string(),
            client_id,
            client_secret,
        }
    }

    /// POST to the token endpoint with the given grant.
    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, StravaError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .http
            .post(STRAVA_TOKEN_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| StravaError::Transport(e.to_string()))?;

        check_response_json(response).await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, StravaError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| StravaError::Transport(e.to_string()))?;

        check_response_json(response).await
    }
}

#[async_trait]
impl StravaApi for StravaClient {
    fn authorization_url(&self, redirect_uri: &str, scope: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
            STRAVA_AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(scope),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, StravaError> {
        self.token_request(&[("code", code), ("grant_type", "authorization_code")])
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, StravaError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn list_activity_summaries(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<StravaActivitySummary>, StravaError> {
        let url = format!("{}/athlete/activities", self.base_url);
        let per_page = limit.clamp(1, MAX_PER_PAGE);
        let mut summaries = Vec::new();
        let mut page = 1u32;

        while (summaries.len() as u32) < limit {
            let batch: Vec<StravaActivitySummary> = self
                .get_json(
                    &url,
                    access_token,
                    &[
                        ("page", page.to_string()),
                        ("per_page", per_page.to_string()),
                    ],
                )
                .await?;

            let fetched = batch.len() as u32;
            summaries.extend(batch);
            if fetched < per_page {
                break;
            }
            page += 1;
        }

        summaries.truncate(limit as usize);
        tracing::debug!(count = summaries.len(), pages = page, "Listed Strava activities");
        Ok(summaries)
    }

    async fn get_activity_detail(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, StravaError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);
        self.get_json(&url, access_token, &[]).await
    }

    async fn get_activity_streams(
        &self,
        access_token: &str,
        activity_id: u64,
        types: &[&str],
    ) -> Result<ActivityStreams, StravaError> {
        let url = format!("{}/activities/{}/streams", self.base_url, activity_id);
        let keyed: HashMap<String, StravaStream> = self
            .get_json(
                &url,
                access_token,
                &[
                    ("keys", types.join(",")),
                    ("key_by_type", "true".to_string()),
                    ("resolution", "medium".to_string()),
                ],
            )
            .await?;

        Ok(keyed
            .into_iter()
            .map(|(kind, stream)| (kind, stream.data))
            .collect())
    }
}

/// Check response status and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, StravaError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        return Err(match status.as_u16() {
            429 => {
                tracing::warn!("Strava rate limit hit (429)");
                StravaError::RateLimited
            }
            // Strava answers a revoked or invalid refresh token with 400 invalid_grant
            401 => StravaError::Unauthorized,
            400 if body.contains("invalid_grant") => StravaError::Unauthorized,
            code => StravaError::Http { status: code, body },
        });
    }

    response
        .json()
        .await
        .map_err(|e| StravaError::Decode(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Response types
// ─────────────────────────────────────────────────────────────────────────────

/// Token response from Strava (authorization code or refresh grant).
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    /// Only present on the authorization code exchange.
    #[serde(default)]
    pub athlete: Option<StravaAthlete>,
}

impl TokenResponse {
    /// The persisted part of the response.
    pub fn credential(&self) -> Credential {
        Credential {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("credential", &self.credential())
            .field("athlete", &self.athlete)
            .finish()
    }
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

/// Summary activity for list endpoints.
///
/// Every metric is optional: Strava omits fields the recording device did
/// not capture.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// Legacy activity type
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub sport_type: Option<String>,
    pub start_date: String,
    /// Seconds
    #[serde(default)]
    pub elapsed_time: Option<f64>,
    /// Seconds
    #[serde(default)]
    pub moving_time: Option<f64>,
    /// Meters
    #[serde(default)]
    pub distance: Option<f64>,
    /// Meters per second
    #[serde(default)]
    pub average_speed: Option<f64>,
    /// Meters per second
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    #[serde(default)]
    pub elev_high: Option<f64>,
    #[serde(default)]
    pub elev_low: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub gear_id: Option<String>,
    #[serde(default)]
    pub trainer: Option<bool>,
    #[serde(default)]
    pub commute: Option<bool>,
    #[serde(default)]
    pub manual: Option<bool>,
    #[serde(default)]
    pub private: Option<bool>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_state: Option<String>,
    #[serde(default)]
    pub location_country: Option<String>,
    #[serde(default)]
    pub map: Option<StravaMap>,
}

/// Detailed Strava activity response.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    #[serde(flatten)]
    pub summary: StravaActivitySummary,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub device_name: Option<String>,
}

/// Activity map data. Only the summary polyline is kept.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaMap {
    #[serde(default)]
    pub summary_polyline: Option<String>,
}

/// One stream when requested with `key_by_type=true`.
#[derive(Debug, Clone, Deserialize)]
struct StravaStream {
    data: Vec<serde_json::Value>,
}

/// Stream samples keyed by stream type ("time", "heartrate", ...).
pub type ActivityStreams = BTreeMap<String, Vec<serde_json::Value>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_encodes_params() {
        let client = StravaClient::new("12345".to_string(), "secret".to_string());
        let url = client.authorization_url(
            "http://localhost:10000/callback",
            "activity:read_all",
            "abc_DEF-123",
        );

        assert!(url.starts_with("https://www.strava.com/oauth/authorize?"));
        assert!(url.contains("client_id=12345"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A10000%2Fcallback"));
        assert!(url.contains("scope=activity%3Aread_all"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=abc_DEF-123"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn test_token_response_to_credential() {
        let json = r#"{
            "token_type": "Bearer",
            "access_token": "new_access",
            "refresh_token": "new_refresh",
            "expires_at": 1700000000,
            "expires_in": 21600
        }"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let credential = response.credential();

        assert!(response.athlete.is_none());
        assert_eq!(credential.access_token, "new_access");
        assert_eq!(credential.refresh_token, "new_refresh");
        assert_eq!(credential.expires_at, 1_700_000_000);
    }

    #[test]
    fn test_summary_tolerates_sparse_payload() {
        let json = r#"{"id": 1, "start_date": "2024-01-02T00:00:00Z"}"#;
        let summary: StravaActivitySummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.id, 1);
        assert!(summary.distance.is_none());
        assert!(summary.map.is_none());
    }

    #[test]
    fn test_detail_flattens_summary() {
        let json = r#"{
            "id": 9,
            "name": "Lunch Run",
            "sport_type": "Run",
            "start_date": "2024-01-02T12:00:00Z",
            "calories": 450.0,
            "device_name": "Apple Watch"
        }"#;
        let detail: StravaActivity = serde_json::from_str(json).unwrap();
        assert_eq!(detail.summary.id, 9);
        assert_eq!(detail.summary.name.as_deref(), Some("Lunch Run"));
        assert_eq!(detail.calories, Some(450.0));
    }

    #[test]
    fn test_token_response_debug_masks_tokens() {
        let response = TokenResponse {
            access_token: "plain-access-token".to_string(),
            refresh_token: "plain-refresh-token".to_string(),
            expires_at: 0,
            athlete: None,
        };
        let printed = format!("{:?}", response);
        assert!(!printed.contains("plain-access-token"));
        assert!(!printed.contains("plain-refresh-token"));
    }
}
