// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Cached activity record and its mapping from Strava responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::services::strava::{StravaActivity, StravaActivitySummary};

/// Flattened snapshot of one Strava activity, as stored in the cache file.
///
/// Only `id` is required when decoding: rows written by older versions of
/// the mapping carry fewer fields and must still load. Keys this version
/// does not know about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Strava activity ID (unique key within the cache)
    pub id: u64,
    pub name: Option<String>,
    /// Activity type (Ride, Run, Hike, etc.)
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    /// Start date/time (ISO 8601, as reported by Strava)
    #[serde(default)]
    pub start_date: String,
    pub elapsed_time_sec: Option<f64>,
    pub moving_time_sec: Option<f64>,
    pub distance_km: Option<f64>,
    pub average_speed_kmh: Option<f64>,
    pub max_speed_kmh: Option<f64>,
    pub total_elevation_gain_m: Option<f64>,
    pub elev_high_m: Option<f64>,
    pub elev_low_m: Option<f64>,
    pub average_watts: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub calories: Option<f64>,
    pub gear_id: Option<String>,
    /// Device name (e.g. "Garmin Edge 530"); only present on detail fetches
    pub device_name: Option<String>,
    pub trainer: Option<bool>,
    pub commute: Option<bool>,
    pub manual: Option<bool>,
    pub private: Option<bool>,
    pub visibility: Option<String>,
    pub location_city: Option<String>,
    pub location_state: Option<String>,
    pub location_country: Option<String>,
    pub map_summary_polyline: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActivityRecord {
    /// Map a list-endpoint summary. Detail-only fields stay empty.
    ///
    /// Strava reports zero for metrics it did not record, so zero
    /// distances, speeds and times are treated as absent.
    pub fn from_summary(summary: &StravaActivitySummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name.clone(),
            activity_type: summary
                .activity_type
                .clone()
                .or_else(|| summary.sport_type.clone()),
            start_date: summary.start_date.clone(),
            elapsed_time_sec: reported(summary.elapsed_time),
            moving_time_sec: reported(summary.moving_time),
            distance_km: reported(summary.distance).map(|m| round2(m / 1000.0)),
            average_speed_kmh: reported(summary.average_speed).map(mps_to_kmh),
            max_speed_kmh: reported(summary.max_speed).map(mps_to_kmh),
            total_elevation_gain_m: summary.total_elevation_gain,
            elev_high_m: summary.elev_high,
            elev_low_m: summary.elev_low,
            average_watts: reported(summary.average_watts),
            average_heartrate: reported(summary.average_heartrate),
            max_heartrate: reported(summary.max_heartrate),
            calories: None,
            gear_id: non_empty(summary.gear_id.as_deref()),
            device_name: None,
            trainer: summary.trainer,
            commute: summary.commute,
            manual: summary.manual,
            private: summary.private,
            visibility: summary.visibility.clone(),
            location_city: non_empty(summary.location_city.as_deref()),
            location_state: non_empty(summary.location_state.as_deref()),
            location_country: non_empty(summary.location_country.as_deref()),
            map_summary_polyline: summary
                .map
                .as_ref()
                .and_then(|m| non_empty(m.summary_polyline.as_deref())),
            extra: Map::new(),
        }
    }

    /// Map a detailed activity, the form stored in the cache.
    pub fn from_detail(detail: &StravaActivity) -> Self {
        Self {
            calories: reported(detail.calories),
            device_name: non_empty(detail.device_name.as_deref()),
            ..Self::from_summary(&detail.summary)
        }
    }
}

fn reported(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

fn mps_to_kmh(mps: f64) -> f64 {
    round2(mps * 3.6)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
