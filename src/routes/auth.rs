// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` stays valid, in milliseconds.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;
/// Tolerated clock skew for timestamps from the future.
const STATE_MAX_SKEW_MS: u128 = 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/callback", get(callback))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthorizeParams {
    /// Where to send the browser once the credential is saved.
    /// Without it the callback answers with JSON.
    #[serde(default)]
    return_to: Option<String>,
}

/// Start OAuth flow - redirect to Strava authorization.
async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect> {
    let return_to = params.return_to.unwrap_or_default();
    if return_to.contains('|') {
        return Err(AppError::BadRequest("return_to must not contain '|'".into()));
    }

    let oauth_state = sign_state(&return_to, now_millis()?, &state.config.oauth_state_key)?;
    let auth_url = state.strava.authorization_url(
        &state.config.strava_redirect_uri,
        &state.config.strava_scope,
        &oauth_state,
    );

    tracing::info!(
        redirect_uri = %state.config.strava_redirect_uri,
        scope = %state.config.strava_scope,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizedResponse {
    pub status: String,
    pub athlete_id: Option<u64>,
    pub expires_at: i64,
}

/// OAuth callback - exchange code for tokens and persist them.
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    // Reject anything we did not start before talking to Strava.
    let return_to = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key, now_millis().ok()?))
        .ok_or_else(|| AppError::BadRequest("Invalid or expired state parameter".into()))?;

    // Check for OAuth errors
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Err(AppError::BadRequest(format!(
            "Authorization was not granted: {}",
            error
        )));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".into()))?;

    tracing::info!("Exchanging authorization code for tokens");
    let exchange = state.strava.exchange_code(&code).await?;
    state.tokens.save_from_exchange(&exchange).await?;

    if !return_to.is_empty() {
        let separator = if return_to.contains('?') { '&' } else { '?' };
        let redirect_url = format!("{}{}authorized=true", return_to, separator);
        return Ok(Redirect::temporary(&redirect_url).into_response());
    }

    Ok(Json(AuthorizedResponse {
        status: "authorized".to_string(),
        athlete_id: exchange.athlete.as_ref().map(|a| a.id),
        expires_at: exchange.expires_at,
    })
    .into_response())
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

fn signature_hex(payload: &str, secret: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build the `state` parameter: base64url of `return_to|timestamp_hex|signature_hex`.
fn sign_state(return_to: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", return_to, timestamp_ms);
    let signature = signature_hex(&payload, secret)?;
    let signed_state = format!("{}|{}", payload, signature);
    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify HMAC signature and age, and decode `return_to` from the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "return_to|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    let [return_to, timestamp_hex, signature] = parts.as_slice() else {
        return None;
    };

    let payload = format!("{}|{}", return_to, timestamp_hex);
    let expected = signature_hex(&payload, secret).ok()?;

    if !bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if timestamp > now_ms + STATE_MAX_SKEW_MS || now_ms.saturating_sub(timestamp) > STATE_MAX_AGE_MS
    {
        tracing::warn!(age_ms = %now_ms.saturating_sub(timestamp), "OAuth state expired");
        return None;
    }

    Some(return_to.to_string())
}
