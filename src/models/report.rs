// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only rollups computed over the cached activities.
//!
//! Both reports are pure reductions over a cache snapshot; nothing here
//! is persisted.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::ActivityRecord;
use crate::time_utils::parse_start_date;

/// Totals for one ISO week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    /// ISO week key, e.g. "2024-W03"
    pub week: String,
    /// Monday of the week (YYYY-MM-DD)
    pub week_start: String,
    pub activities: u32,
    pub distance_km: f64,
    pub moving_time_sec: f64,
    pub elapsed_time_sec: f64,
    pub elevation_gain_m: f64,
    /// Activity count per type
    pub by_type: BTreeMap<String, u32>,
}

impl WeeklySummary {
    fn new(week: String, week_start: String) -> Self {
        Self {
            week,
            week_start,
            activities: 0,
            distance_km: 0.0,
            moving_time_sec: 0.0,
            elapsed_time_sec: 0.0,
            elevation_gain_m: 0.0,
            by_type: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &ActivityRecord) {
        self.activities += 1;
        self.distance_km += record.distance_km.unwrap_or(0.0);
        self.moving_time_sec += record.moving_time_sec.unwrap_or(0.0);
        self.elapsed_time_sec += record.elapsed_time_sec.unwrap_or(0.0);
        self.elevation_gain_m += record.total_elevation_gain_m.unwrap_or(0.0);

        let activity_type = record.activity_type.as_deref().unwrap_or("Unknown");
        *self.by_type.entry(activity_type.to_string()).or_insert(0) += 1;
    }
}

/// Usage totals for one piece of gear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GearUsage {
    pub gear_id: String,
    pub activities: u32,
    pub distance_km: f64,
    pub moving_time_sec: f64,
    /// Earliest `start_date` seen with this gear
    pub first_used: Option<String>,
    /// Latest `start_date` seen with this gear
    pub last_used: Option<String>,
}

impl GearUsage {
    fn new(gear_id: String) -> Self {
        Self {
            gear_id,
            activities: 0,
            distance_km: 0.0,
            moving_time_sec: 0.0,
            first_used: None,
            last_used: None,
        }
    }

    fn add(&mut self, record: &ActivityRecord) {
        self.activities += 1;
        self.distance_km += record.distance_km.unwrap_or(0.0);
        self.moving_time_sec += record.moving_time_sec.unwrap_or(0.0);

        let Some(started) = parse_start_date(&record.start_date) else {
            return;
        };
        let earlier = self
            .first_used
            .as_deref()
            .and_then(parse_start_date)
            .is_none_or(|first| started < first);
        if earlier {
            self.first_used = Some(record.start_date.clone());
        }
        let later = self
            .last_used
            .as_deref()
            .and_then(parse_start_date)
            .is_none_or(|last| started > last);
        if later {
            self.last_used = Some(record.start_date.clone());
        }
    }
}

/// Group activities by ISO week, most recent week first.
///
/// Activities whose `start_date` cannot be parsed are left out.
pub fn weekly_summaries(records: &[ActivityRecord]) -> Vec<WeeklySummary> {
    let mut weeks: BTreeMap<(i32, u32), WeeklySummary> = BTreeMap::new();

    for record in records {
        let Some(started) = parse_start_date(&record.start_date) else {
            tracing::debug!(id = record.id, "Skipping activity with unparseable start_date");
            continue;
        };
        let iso = started.iso_week();
        let key = (iso.year(), iso.week());

        weeks
            .entry(key)
            .or_insert_with(|| {
                let monday = NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                WeeklySummary::new(format!("{}-W{:02}", iso.year(), iso.week()), monday)
            })
            .add(record);
    }

    weeks
        .into_values()
        .rev()
        .map(|mut week| {
            week.distance_km = round2(week.distance_km);
            week.elevation_gain_m = round2(week.elevation_gain_m);
            week
        })
        .collect()
}

/// Group activities by `gear_id`, highest distance first.
///
/// Activities without gear are left out.
pub fn gear_usage(records: &[ActivityRecord]) -> Vec<GearUsage> {
    let mut gear: HashMap<&str, GearUsage> = HashMap::new();

    for record in records {
        let Some(gear_id) = record.gear_id.as_deref() else {
            continue;
        };
        gear.entry(gear_id)
            .or_insert_with(|| GearUsage::new(gear_id.to_string()))
            .add(record);
    }

    let mut usage: Vec<GearUsage> = gear
        .into_values()
        .map(|mut g| {
            g.distance_km = round2(g.distance_km);
            g
        })
        .collect();
    usage.sort_by(|a, b| {
        b.distance_km
            .total_cmp(&a.distance_km)
            .then_with(|| a.gear_id.cmp(&b.gear_id))
    });
    usage
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
