// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-disk activity cache.
//!
//! The cache is a single JSON array of [`ActivityRecord`], newest first,
//! with at most one entry per activity id. Records are never updated once
//! cached: a merge only ever appends ids it has not seen.
//!
//! Read paths degrade to an empty cache when the file is missing, blank,
//! `null` or unparseable. A merge over an unparseable file first copies it
//! to a fresh `.corrupt` backup; only that copy or the write itself can fail.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::db::json_file::{self, JsonFileError};
use crate::error::Result;
use crate::models::ActivityRecord;
use crate::time_utils::parse_start_date;

/// Result of merging a batch into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Records appended by this merge
    pub added: usize,
    /// Records dropped because their id was already cached (or repeated
    /// earlier in the same batch)
    pub already_present: usize,
    /// Cache size after the merge
    pub total: usize,
}

/// Backups kept per cache file before a merge over a malformed file gives up.
const MAX_CORRUPT_BACKUPS: u32 = 100;

/// Owner of the activity cache file.
pub struct ActivityCache {
    path: PathBuf,
    /// Serializes the read-modify-write in `merge`.
    write_lock: Mutex<()>,
}

impl ActivityCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ids currently cached.
    pub async fn existing_ids(&self) -> HashSet<u64> {
        self.read_all().await.iter().map(|r| r.id).collect()
    }

    /// Full cached collection, newest first.
    pub async fn read_all(&self) -> Vec<ActivityRecord> {
        match self.load().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Activity cache unreadable, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Look up one cached activity.
    pub async fn get(&self, activity_id: u64) -> Option<ActivityRecord> {
        self.read_all()
            .await
            .into_iter()
            .find(|r| r.id == activity_id)
    }

    /// Append the records whose id is not cached yet, re-sort and persist.
    ///
    /// Either the whole merged collection is written or, on error, the
    /// previous file is left in place.
    pub async fn merge(&self, records: Vec<ActivityRecord>) -> Result<MergeOutcome> {
        let _guard = self.write_lock.lock().await;

        let mut cached = match self.load().await {
            Ok(cached) => cached,
            Err(JsonFileError::Malformed { source, .. }) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %source,
                    "Activity cache is malformed, starting fresh"
                );
                // Copy, not move: if the write below fails the target must
                // still hold what it held before.
                self.back_up_corrupt_file().await?;
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut seen: HashSet<u64> = cached.iter().map(|r| r.id).collect();
        let before = cached.len();
        let mut already_present = 0;

        for record in records {
            if seen.insert(record.id) {
                cached.push(record);
            } else {
                already_present += 1;
            }
        }

        let added = cached.len() - before;
        sort_newest_first(&mut cached);
        json_file::write_json_atomic(&self.path, &cached, false).await?;

        let outcome = MergeOutcome {
            added,
            already_present,
            total: cached.len(),
        };
        tracing::info!(
            added = outcome.added,
            already_present = outcome.already_present,
            total = outcome.total,
            "Activity cache merged"
        );
        Ok(outcome)
    }

    async fn load(&self) -> std::result::Result<Vec<ActivityRecord>, JsonFileError> {
        // A top-level `null` decodes to `None`, same as a missing file.
        let records: Option<Option<Vec<ActivityRecord>>> = json_file::read_json(&self.path).await?;
        Ok(records.flatten().unwrap_or_default())
    }

    /// Copy a malformed cache to the first free `<name>.corrupt[.N]` path.
    ///
    /// Existing backups are never replaced.
    async fn back_up_corrupt_file(&self) -> std::result::Result<PathBuf, JsonFileError> {
        let contents = tokio::fs::read(&self.path)
            .await
            .map_err(|e| JsonFileError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        for n in 0..MAX_CORRUPT_BACKUPS {
            let mut backup = self.path.clone().into_os_string();
            backup.push(".corrupt");
            if n > 0 {
                backup.push(format!(".{}", n));
            }
            let backup = PathBuf::from(backup);

            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&backup)
                .await;
            let mut file = match opened {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(JsonFileError::Io { path: backup, source: e }),
            };

            if let Err(e) = file.write_all(&contents).await {
                return Err(JsonFileError::Io { path: backup, source: e });
            }
            if let Err(e) = file.sync_all().await {
                return Err(JsonFileError::Io { path: backup, source: e });
            }

            tracing::warn!(backup = %backup.display(), "Malformed cache backed up");
            return Ok(backup);
        }

        Err(JsonFileError::Io {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "no free backup name"),
        })
    }
}

/// Stable sort by `start_date`, newest first.
///
/// Dates are compared as instants, so equal instants written with
/// different offsets keep their relative order. Dates that do not parse
/// sort after every parseable one, ordered by their raw text.
pub fn sort_newest_first(records: &mut [ActivityRecord]) {
    records.sort_by_cached_key(|r| Reverse(start_key(&r.start_date)));
}

fn start_key(raw: &str) -> (Option<DateTime<Utc>>, String) {
    match parse_start_date(raw) {
        Some(started) => (Some(started), String::new()),
        None => (None, raw.to_string()),
    }
}
