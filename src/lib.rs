// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava-Cache: keep a local copy of your Strava activities
//!
//! This crate keeps a Strava OAuth credential fresh on disk and maintains
//! an incremental JSON cache of activity details, served over a small
//! HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{ActivityCache, ActivitySync, StravaApi, TokenStore};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub strava: Arc<dyn StravaApi>,
    pub tokens: TokenStore,
    pub cache: ActivityCache,
    pub sync: ActivitySync,
}

impl AppState {
    /// Wire up the stores from the configured file paths.
    pub fn new(config: Config, strava: Arc<dyn StravaApi>) -> Self {
        Self {
            tokens: TokenStore::new(config.token_path.clone()),
            cache: ActivityCache::new(config.activity_cache_path.clone()),
            sync: ActivitySync::new(config.activity_limit),
            strava,
            config,
        }
    }
}
