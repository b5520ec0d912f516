// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.
//!
//! There is no session layer: the service holds a single Strava
//! credential on disk, so every route is public and `/authorize` is how a
//! missing or revoked credential gets replaced.

pub mod api;
pub mod auth;

use crate::AppState;
use axum::extract::State;
use axum::http::{header, request::Parts, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub build_id: &'static str,
    /// Whether a credential file is present. It may still be expired.
    pub credential_saved: bool,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let credential_saved = tokio::fs::try_exists(state.tokens.path())
        .await
        .unwrap_or(false);
    Json(HealthResponse {
        status: "ok",
        build_id: option_env!("BUILD_ID").unwrap_or("unknown"),
        credential_saved,
    })
}

/// The configured frontend, plus any local dev server on plain HTTP.
fn origin_allowed(origin: &str, frontend_url: &str) -> bool {
    if origin == frontend_url {
        return true;
    }
    let Some(host_port) = origin.strip_prefix("http://") else {
        return false;
    };
    let host = host_port.split(':').next().unwrap_or_default();
    host == "localhost" || host == "127.0.0.1"
}

/// Browsers only need to read JSON and trigger `/save-json`; no cookies
/// are involved.
fn cors_layer(frontend_url: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| origin_allowed(origin, &frontend_url))
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.frontend_url.clone());

    Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes())
        .merge(api::routes())
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
