// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::JsonFileError;
use crate::services::strava::StravaError;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No usable credential on disk; the authorization flow must be run.
    #[error("Not authenticated with Strava")]
    NotAuthenticated,

    /// Strava rejected the refresh exchange. The stale credential stays on disk.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] StravaError),

    #[error("Strava API error: {0}")]
    StravaApi(#[from] StravaError),

    /// Local write failed; the previous on-disk state is unchanged.
    #[error("Persist error: {0}")]
    Persist(#[from] JsonFileError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller has to re-run the authorization flow.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AppError::NotAuthenticated
                | AppError::RefreshFailed(_)
                | AppError::StravaApi(StravaError::Unauthorized)
        )
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    /// Set when the client must run `/authorize` again.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    reauth: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let reauth = self.requires_reauth();
        let (status, error, details) = match &self {
            AppError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated", None),
            AppError::RefreshFailed(err) => {
                tracing::warn!(error = %err, "Strava token refresh rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "refresh_failed",
                    Some(err.to_string()),
                )
            }
            AppError::StravaApi(StravaError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "strava_unauthorized", None)
            }
            AppError::StravaApi(StravaError::RateLimited) => {
                (StatusCode::TOO_MANY_REQUESTS, "strava_rate_limited", None)
            }
            AppError::StravaApi(err) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(err.to_string()))
            }
            AppError::Persist(err) => {
                tracing::error!(error = %err, "Persist error");
                (StatusCode::INTERNAL_SERVER_ERROR, "persist_error", None)
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            reauth,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
