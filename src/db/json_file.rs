// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Whole-file JSON persistence.
//!
//! Reads distinguish "nothing there" (missing or blank file) from a file
//! that exists but does not decode, so each caller can pick its own
//! degradation policy. Writes always go to a sibling temp file which is
//! synced and then renamed over the target, so a reader never observes a
//! torn document.

use serde::{de::DeserializeOwned, Serialize};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Errors from reading or writing a JSON file.
#[derive(Debug, thiserror::Error)]
pub enum JsonFileError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed JSON in {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode JSON for {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl JsonFileError {
    fn io(path: &Path, source: io::Error) -> Self {
        JsonFileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read and decode a JSON file.
///
/// Returns `Ok(None)` when the file does not exist or holds only whitespace.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, JsonFileError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(JsonFileError::io(path, e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| JsonFileError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Encode `value` and atomically replace `path` with it.
///
/// With `private` set, the file is created readable by the owner only
/// (Unix). On error the temp file is removed and `path` is left as it was.
pub async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    private: bool,
) -> Result<(), JsonFileError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| JsonFileError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| JsonFileError::io(parent, e))?;
    }

    let temp_path = temp_path_for(path);
    let result = write_then_rename(&temp_path, path, &json, private).await;

    if result.is_err() {
        // Best effort; the target itself was never touched.
        let _ = tokio::fs::remove_file(&temp_path).await;
    }

    result
}

async fn write_then_rename(
    temp_path: &Path,
    path: &Path,
    json: &[u8],
    private: bool,
) -> Result<(), JsonFileError> {
    // The mode only applies to a newly created file, so a temp file left by
    // an interrupted write must go first.
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => tracing::debug!(path = ?temp_path, "Removed stale temp file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(JsonFileError::io(temp_path, e)),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options
        .open(temp_path)
        .await
        .map_err(|e| JsonFileError::io(temp_path, e))?;
    file.write_all(json)
        .await
        .map_err(|e| JsonFileError::io(temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| JsonFileError::io(temp_path, e))?;
    drop(file);

    tokio::fs::rename(temp_path, path)
        .await
        .map_err(|e| JsonFileError::io(path, e))
}

/// `token.json` -> `token.json.tmp`, in the same directory so the rename
/// never crosses a filesystem boundary.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("data"));
    name.push(".tmp");
    path.with_file_name(name)
}
