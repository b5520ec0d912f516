// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava-Cache API Server
//!
//! Keeps a Strava credential fresh and an incremental activity cache on
//! local disk.

use std::sync::Arc;
use strava_cache::{config::Config, services::StravaClient, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Strava-Cache API");
    tracing::info!(
        token_path = %config.token_path.display(),
        cache_path = %config.activity_cache_path.display(),
        activity_limit = config.activity_limit,
        "Local storage configured"
    );

    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), Arc::new(strava)));

    // Build router
    let app = strava_cache::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("strava_cache=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
