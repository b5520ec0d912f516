// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity, cache and report routes.
//!
//! Every handler that talks to Strava first asks the [`TokenStore`] for a
//! valid access token, so an expired credential is refreshed transparently
//! and a missing one surfaces as `401 not_authenticated`.
//!
//! [`TokenStore`]: crate::services::TokenStore

use crate::error::{AppError, Result};
use crate::models::report::{gear_usage, weekly_summaries};
use crate::models::{ActivityRecord, GearUsage, WeeklySummary};
use crate::services::strava::{ActivityStreams, DEFAULT_STREAM_TYPES, MAX_PER_PAGE};
use crate::services::{StravaError, SyncReport, TokenStatus};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", get(list_activities))
        .route("/activities/{id}", get(get_activity))
        .route("/streams/{id}", get(get_streams))
        .route("/save-json", get(save_json).post(save_json))
        .route("/download-json", get(download_json))
        .route("/reports/weekly", get(weekly_report))
        .route("/reports/gear", get(gear_report))
        .route("/debug/token", get(debug_token))
}

// ─── Live Strava reads ───────────────────────────────────────

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    limit: Option<u32>,
}

/// Most recent activities straight from Strava, newest first.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ActivityRecord>>> {
    let limit = params
        .limit
        .unwrap_or(state.config.activity_limit)
        .clamp(1, MAX_PER_PAGE);

    let access_token = state.tokens.get_valid_access_token(&*state.strava).await?;
    let summaries = state
        .strava
        .list_activity_summaries(&access_token, limit)
        .await?;

    Ok(Json(
        summaries.iter().map(ActivityRecord::from_summary).collect(),
    ))
}

/// One activity: the cached record when there is one, otherwise a live
/// detail fetch. Live results are not written to the cache.
async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<u64>,
) -> Result<Json<ActivityRecord>> {
    if let Some(record) = state.cache.get(activity_id).await {
        tracing::debug!(activity_id, "Serving activity from cache");
        return Ok(Json(record));
    }

    let access_token = state.tokens.get_valid_access_token(&*state.strava).await?;
    let detail = state
        .strava
        .get_activity_detail(&access_token, activity_id)
        .await
        .map_err(not_found_as(activity_id))?;
    Ok(Json(ActivityRecord::from_detail(&detail)))
}

#[derive(Deserialize)]
pub struct StreamParams {
    /// Comma-separated stream types; defaults to the standard set.
    #[serde(default)]
    keys: Option<String>,
}

async fn get_streams(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<u64>,
    Query(params): Query<StreamParams>,
) -> Result<Json<ActivityStreams>> {
    let requested: Vec<&str> = match params.keys.as_deref() {
        Some(keys) => keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .collect(),
        None => DEFAULT_STREAM_TYPES.to_vec(),
    };
    if requested.is_empty() {
        return Err(AppError::BadRequest("No stream types requested".into()));
    }

    let access_token = state.tokens.get_valid_access_token(&*state.strava).await?;
    let streams = state
        .strava
        .get_activity_streams(&access_token, activity_id, &requested)
        .await
        .map_err(not_found_as(activity_id))?;
    Ok(Json(streams))
}

/// Strava answers 404 for activities that do not exist or are not visible
/// to the athlete.
fn not_found_as(activity_id: u64) -> impl FnOnce(StravaError) -> AppError {
    move |err| match err {
        StravaError::Http { status: 404, .. } => {
            AppError::NotFound(format!("Activity {}", activity_id))
        }
        other => other.into(),
    }
}

// ─── Cache ───────────────────────────────────────────────────

/// Run an incremental sync into the local cache.
async fn save_json(State(state): State<Arc<AppState>>) -> Result<Json<SyncReport>> {
    let report = state
        .sync
        .run(&*state.strava, &state.tokens, &state.cache)
        .await?;
    Ok(Json(report))
}

/// The whole cache as a downloadable JSON array.
async fn download_json(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let records = state.cache.read_all().await;
    (
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"activities.json\"",
        )],
        Json(records),
    )
}

// ─── Reports ─────────────────────────────────────────────────

async fn weekly_report(State(state): State<Arc<AppState>>) -> Json<Vec<WeeklySummary>> {
    Json(weekly_summaries(&state.cache.read_all().await))
}

async fn gear_report(State(state): State<Arc<AppState>>) -> Json<Vec<GearUsage>> {
    Json(gear_usage(&state.cache.read_all().await))
}

// ─── Diagnostics ─────────────────────────────────────────────

async fn debug_token(State(state): State<Arc<AppState>>) -> Result<Json<TokenStatus>> {
    Ok(Json(state.tokens.status().await?))
}
