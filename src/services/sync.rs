// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Incremental activity sync.
//!
//! Handles the core workflow:
//! 1. Get a valid access token (refreshing if needed)
//! 2. List recent activity summaries from Strava
//! 3. Check them against the cached ids, once
//! 4. Fetch detail only for activities not cached yet
//! 5. Merge the fetched details into the cache
//!
//! Step 4 is the only per-activity upstream call, so an up-to-date cache
//! costs a single list request.

use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::ActivityRecord;
use crate::services::{ActivityCache, StravaApi, TokenStore};

/// Outcome of one sync run.
///
/// `added + already_cached == fetched - skipped` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Summaries returned by the list call
    pub fetched: usize,
    /// Newly cached activities
    pub added: usize,
    /// Summaries that were already cached (no detail fetched)
    pub already_cached: usize,
    /// Activities whose detail fetch failed
    pub skipped: usize,
    pub skipped_ids: Vec<u64>,
    /// Cache size after the run
    pub total: usize,
}

/// Runs the sync workflow, one run at a time.
pub struct ActivitySync {
    list_limit: u32,
    /// Two overlapping runs would see the same cached ids and fetch the
    /// same details twice.
    run_lock: Mutex<()>,
}

impl ActivitySync {
    pub fn new(list_limit: u32) -> Self {
        Self {
            list_limit,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn run(
        &self,
        strava: &dyn StravaApi,
        tokens: &TokenStore,
        cache: &ActivityCache,
    ) -> Result<SyncReport> {
        let _guard = self.run_lock.lock().await;

        let access_token = tokens.get_valid_access_token(strava).await?;
        let summaries = strava
            .list_activity_summaries(&access_token, self.list_limit)
            .await?;
        let existing = cache.existing_ids().await;

        tracing::info!(
            fetched = summaries.len(),
            cached = existing.len(),
            "Starting activity sync"
        );

        let mut requested: HashSet<u64> = HashSet::new();
        let mut already_cached = 0;
        let mut details: Vec<ActivityRecord> = Vec::new();
        let mut skipped_ids: Vec<u64> = Vec::new();
        let mut rate_limited = false;

        for summary in &summaries {
            // Paging can repeat an activity; count repeats as cached.
            if existing.contains(&summary.id) || !requested.insert(summary.id) {
                already_cached += 1;
                continue;
            }

            // Every further call would be rejected too.
            if rate_limited {
                skipped_ids.push(summary.id);
                continue;
            }

            match strava.get_activity_detail(&access_token, summary.id).await {
                Ok(detail) => details.push(ActivityRecord::from_detail(&detail)),
                Err(e) => {
                    tracing::warn!(
                        activity_id = summary.id,
                        error = %e,
                        "Failed to fetch activity detail, skipping"
                    );
                    rate_limited = e.is_rate_limited();
                    skipped_ids.push(summary.id);
                }
            }
        }

        let outcome = cache.merge(details).await?;

        let report = SyncReport {
            fetched: summaries.len(),
            added: outcome.added,
            already_cached: already_cached + outcome.already_present,
            skipped: skipped_ids.len(),
            skipped_ids,
            total: outcome.total,
        };

        tracing::info!(
            fetched = report.fetched,
            added = report.added,
            already_cached = report.already_cached,
            skipped = report.skipped,
            total = report.total,
            "Activity sync complete"
        );
        Ok(report)
    }
}
