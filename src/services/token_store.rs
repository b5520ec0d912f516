// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential lifecycle.
//!
//! The credential lives in a single JSON file. Every write replaces the
//! whole file (temp file + rename), so the file always holds either the
//! previous complete credential or the new one.

use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::db::json_file::{self, JsonFileError};
use crate::error::{AppError, Result};
use crate::models::credential::{mask_token, Credential};
use crate::services::strava::{StravaApi, TokenResponse};
use crate::time_utils::{format_epoch_rfc3339, now_epoch};

/// Owner of the persisted Strava credential.
pub struct TokenStore {
    path: PathBuf,
    /// Serializes check-expiry / refresh / persist so concurrent requests
    /// never spend the same refresh token twice.
    refresh_lock: Mutex<()>,
}

/// Credential state for diagnostics. Never carries the tokens themselves.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenStatus {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    /// `expires_at` as RFC3339, for humans
    pub expires_at_utc: Option<String>,
    pub expires_in_sec: i64,
    pub expired: bool,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted credential.
    ///
    /// A missing file, or one that does not decode to a complete
    /// credential, is `NotAuthenticated`.
    pub async fn load(&self) -> Result<Credential> {
        match json_file::read_json::<Credential>(&self.path).await {
            Ok(Some(credential)) => Ok(credential),
            Ok(None) => Err(AppError::NotAuthenticated),
            Err(JsonFileError::Malformed { source, .. }) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %source,
                    "Credential file is not a complete credential, treating as absent"
                );
                Err(AppError::NotAuthenticated)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get an access token that is valid right now.
    ///
    /// If the stored token has expired it is refreshed with Strava and the
    /// full replacement credential is persisted before returning. When the
    /// refresh is rejected the stored credential is left as it was.
    pub async fn get_valid_access_token(&self, strava: &dyn StravaApi) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let credential = self.load().await?;
        let now = now_epoch();

        if !credential.is_expired_at(now) {
            return Ok(credential.access_token);
        }

        tracing::info!(
            expired_for_sec = now - credential.expires_at,
            "Access token expired, refreshing"
        );

        let refreshed = strava
            .refresh(&credential.refresh_token)
            .await
            .map_err(AppError::RefreshFailed)?;

        let new_credential = refreshed.credential();
        // Strava may already have rotated the refresh token, so a token we
        // could not save is never handed out.
        if let Err(err) = self.persist(&new_credential).await {
            tracing::error!(error = %err, "Refreshed token could not be saved");
            return Err(err);
        }

        tracing::info!(expires_at = new_credential.expires_at, "Token refreshed and saved");
        Ok(new_credential.access_token)
    }

    /// Persist the result of an authorization code exchange, replacing any
    /// previous credential.
    pub async fn save_from_exchange(&self, exchange: &TokenResponse) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let credential = exchange.credential();
        self.persist(&credential).await?;

        tracing::info!(
            athlete_id = exchange.athlete.as_ref().map(|a| a.id),
            expires_at = credential.expires_at,
            "Credential saved from code exchange"
        );
        Ok(())
    }

    /// Current credential state with masked tokens.
    pub async fn status(&self) -> Result<TokenStatus> {
        let credential = self.load().await?;
        let now = now_epoch();

        Ok(TokenStatus {
            access_token: mask_token(&credential.access_token),
            refresh_token: mask_token(&credential.refresh_token),
            expires_at: credential.expires_at,
            expires_at_utc: format_epoch_rfc3339(credential.expires_at),
            expires_in_sec: credential.expires_in(now),
            expired: credential.is_expired_at(now),
        })
    }

    async fn persist(&self, credential: &Credential) -> Result<()> {
        json_file::write_json_atomic(&self.path, credential, true).await?;
        Ok(())
    }
}
