// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strava_cache::config::Config;
use strava_cache::models::Credential;
use strava_cache::routes::create_router;
use strava_cache::services::strava::{
    ActivityStreams, StravaActivity, StravaActivitySummary, TokenResponse,
};
use strava_cache::services::{StravaApi, StravaError};
use strava_cache::time_utils::now_epoch;
use strava_cache::AppState;
use tempfile::TempDir;

/// In-memory stand-in for the Strava API with call counters.
#[derive(Default)]
pub struct FakeStrava {
    /// Detail payloads, in the order the list endpoint returns them.
    activities: Mutex<Vec<Value>>,
    failing_details: Mutex<HashSet<u64>>,
    /// Detail calls that succeed before every further one is rate limited.
    rate_limit_after: Mutex<Option<usize>>,
    reject_refresh: AtomicBool,
    /// Access tokens presented to the read endpoints.
    seen_tokens: Mutex<Vec<String>>,
    pub refresh_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeStrava {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activities(activities: Vec<Value>) -> Self {
        let fake = Self::default();
        *fake.activities.lock().unwrap() = activities;
        fake
    }

    pub fn fail_detail(&self, activity_id: u64) {
        self.failing_details.lock().unwrap().insert(activity_id);
    }

    pub fn rate_limit_after(&self, successful_calls: usize) {
        *self.rate_limit_after.lock().unwrap() = Some(successful_calls);
    }

    pub fn reject_refresh(&self) {
        self.reject_refresh.store(true, Ordering::SeqCst);
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn detail_fetches(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn seen_tokens(&self) -> Vec<String> {
        self.seen_tokens.lock().unwrap().clone()
    }

    fn record_token(&self, access_token: &str) {
        self.seen_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());
    }
}

#[async_trait]
impl StravaApi for FakeStrava {
    fn authorization_url(&self, redirect_uri: &str, scope: &str, state: &str) -> String {
        format!(
            "https://strava.test/oauth/authorize?redirect_uri={}&scope={}&state={}",
            redirect_uri, scope, state
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, StravaError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if code != "good_code" {
            return Err(StravaError::Unauthorized);
        }
        Ok(serde_json::from_value(json!({
            "access_token": "exchanged_access",
            "refresh_token": "exchanged_refresh",
            "expires_at": now_epoch() + 21600,
            "athlete": { "id": 4242, "firstname": "Test" }
        }))
        .unwrap())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, StravaError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(StravaError::Unauthorized);
        }
        assert!(!refresh_token.is_empty());
        Ok(serde_json::from_value(json!({
            "access_token": format!("refreshed_access_{}", n),
            "refresh_token": format!("refreshed_refresh_{}", n),
            "expires_at": now_epoch() + 21600
        }))
        .unwrap())
    }

    async fn list_activity_summaries(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<StravaActivitySummary>, StravaError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(access_token);
        let activities = self.activities.lock().unwrap().clone();
        Ok(activities
            .into_iter()
            .take(limit as usize)
            .map(|a| serde_json::from_value(a).unwrap())
            .collect())
    }

    async fn get_activity_detail(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, StravaError> {
        let call = self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(access_token);

        if let Some(allowed) = *self.rate_limit_after.lock().unwrap() {
            if call >= allowed {
                return Err(StravaError::RateLimited);
            }
        }
        if self.failing_details.lock().unwrap().contains(&activity_id) {
            return Err(StravaError::Http {
                status: 500,
                body: "upstream exploded".to_string(),
            });
        }

        let activities = self.activities.lock().unwrap();
        let found = activities
            .iter()
            .find(|a| a["id"].as_u64() == Some(activity_id))
            .cloned();
        match found {
            Some(a) => Ok(serde_json::from_value(a).unwrap()),
            None => Err(StravaError::Http {
                status: 404,
                body: "Record Not Found".to_string(),
            }),
        }
    }

    async fn get_activity_streams(
        &self,
        access_token: &str,
        _activity_id: u64,
        types: &[&str],
    ) -> Result<ActivityStreams, StravaError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.record_token(access_token);
        Ok(types
            .iter()
            .map(|t| (t.to_string(), vec![json!(0), json!(1), json!(2)]))
            .collect())
    }
}

/// A detail payload as Strava would send it.
#[allow(dead_code)]
pub fn activity_json(id: u64, start_date: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "type": "Ride",
        "sport_type": "Ride",
        "start_date": start_date,
        "elapsed_time": 3600,
        "moving_time": 3400,
        "distance": 25000.0,
        "average_speed": 7.5,
        "max_speed": 14.25,
        "total_elevation_gain": 310.0,
        "gear_id": "b123",
        "calories": 800.0,
        "device_name": "Garmin Edge 540"
    })
}

/// Write a credential file directly, bypassing the store.
#[allow(dead_code)]
pub fn write_credential(path: &Path, access_token: &str, refresh_token: &str, expires_at: i64) {
    let credential = Credential {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at,
    };
    std::fs::write(path, serde_json::to_vec_pretty(&credential).unwrap()).unwrap();
}

#[allow(dead_code)]
pub fn read_credential(path: &Path) -> Credential {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Ids in the on-disk cache, in file order.
#[allow(dead_code)]
pub fn cached_ids(path: &Path) -> Vec<u64> {
    let cached: Vec<Value> = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
    cached.iter().map(|a| a["id"].as_u64().unwrap()).collect()
}

/// A test app whose files live in a private temp directory.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub strava: Arc<FakeStrava>,
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub fn token_path(&self) -> &Path {
        &self.state.config.token_path
    }

    pub fn cache_path(&self) -> &Path {
        &self.state.config.activity_cache_path
    }

    /// Store a credential that stays valid for the next six hours.
    pub fn authenticate(&self) {
        write_credential(
            self.token_path(),
            "valid_access",
            "valid_refresh",
            now_epoch() + 21600,
        );
    }
}

/// Create a test app backed by `strava` and an empty temp directory.
#[allow(dead_code)]
pub fn create_test_app(strava: FakeStrava) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        token_path: dir.path().join("token.json"),
        activity_cache_path: dir.path().join("activities.json"),
        ..Config::default()
    };

    let strava = Arc::new(strava);
    let state = Arc::new(AppState::new(config, strava.clone()));

    TestApp {
        router: create_router(state.clone()),
        state,
        strava,
        dir,
    }
}
