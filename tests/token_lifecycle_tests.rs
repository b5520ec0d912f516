// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential lifecycle tests.
//!
//! These tests verify that:
//! 1. An expired credential is refreshed exactly once and persisted
//! 2. A valid credential is returned without talking to Strava
//! 3. A missing or broken credential file means "not authenticated"
//! 4. A rejected refresh leaves the stored credential untouched

use std::sync::Arc;
use strava_cache::error::AppError;
use strava_cache::services::TokenStore;
use strava_cache::time_utils::now_epoch;

mod common;
use common::{read_credential, write_credential, FakeStrava};

fn store_in(dir: &tempfile::TempDir) -> TokenStore {
    TokenStore::new(dir.path().join("token.json"))
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    write_credential(store.path(), "old_access", "old_refresh", now_epoch() - 60);

    let strava = FakeStrava::new();
    let token = store.get_valid_access_token(&strava).await.unwrap();

    assert_eq!(token, "refreshed_access_1");
    assert_eq!(strava.refreshes(), 1);

    let saved = read_credential(store.path());
    assert_eq!(saved.access_token, "refreshed_access_1");
    assert_eq!(saved.refresh_token, "refreshed_refresh_1");
    assert!(saved.expires_at > now_epoch());

    // The refreshed credential is now valid; no second refresh.
    let again = store.get_valid_access_token(&strava).await.unwrap();
    assert_eq!(again, "refreshed_access_1");
    assert_eq!(strava.refreshes(), 1);
}

#[tokio::test]
async fn test_valid_token_is_returned_without_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    write_credential(store.path(), "fresh_access", "fresh_refresh", now_epoch() + 3600);

    let strava = FakeStrava::new();
    let token = store.get_valid_access_token(&strava).await.unwrap();

    assert_eq!(token, "fresh_access");
    assert_eq!(strava.refreshes(), 0);
}

#[tokio::test]
async fn test_expiry_boundary_counts_as_expired() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    // Expires this very second.
    write_credential(store.path(), "old_access", "old_refresh", now_epoch());

    let strava = FakeStrava::new();
    store.get_valid_access_token(&strava).await.unwrap();
    assert_eq!(strava.refreshes(), 1);
}

#[tokio::test]
async fn test_missing_credential_is_not_authenticated() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);

    let strava = FakeStrava::new();
    let err = store.get_valid_access_token(&strava).await.unwrap_err();

    assert!(matches!(err, AppError::NotAuthenticated));
    assert!(err.requires_reauth());
    assert_eq!(strava.refreshes(), 0);
}

#[tokio::test]
async fn test_incomplete_credential_is_not_authenticated() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.path(), r#"{"access_token": "a", "expires_at": 1}"#).unwrap();

    let err = store.load().await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated));

    std::fs::write(store.path(), "not json at all").unwrap();
    let err = store.load().await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated));
}

#[tokio::test]
async fn test_extra_keys_in_credential_file_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    std::fs::write(
        store.path(),
        r#"{"access_token": "a", "refresh_token": "r", "expires_at": 4102444800, "token_type": "Bearer"}"#,
    )
    .unwrap();

    let credential = store.load().await.unwrap();
    assert_eq!(credential.access_token, "a");
    assert_eq!(credential.expires_at, 4102444800);
}

#[tokio::test]
async fn test_rejected_refresh_leaves_credential_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let expires_at = now_epoch() - 60;
    write_credential(store.path(), "old_access", "old_refresh", expires_at);
    let before = std::fs::read(store.path()).unwrap();

    let strava = FakeStrava::new();
    strava.reject_refresh();
    let err = store.get_valid_access_token(&strava).await.unwrap_err();

    assert!(matches!(err, AppError::RefreshFailed(_)));
    assert!(err.requires_reauth());
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(store_in(&dir));
    write_credential(store.path(), "old_access", "old_refresh", now_epoch() - 60);

    let strava = Arc::new(FakeStrava::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let strava = strava.clone();
        handles.push(tokio::spawn(async move {
            store.get_valid_access_token(strava.as_ref()).await.unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), "refreshed_access_1");
    }
    assert_eq!(strava.refreshes(), 1);
}

#[tokio::test]
async fn test_status_masks_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    write_credential(store.path(), "access-abcd", "refresh-wxyz", now_epoch() + 100);

    let status = store.status().await.unwrap();

    assert_eq!(status.access_token, "*******abcd");
    assert_eq!(status.refresh_token, "********wxyz");
    assert!(!status.expired);
    assert!(status.expires_in_sec > 0 && status.expires_in_sec <= 100);
    assert!(status.expires_at_utc.is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_refreshed_credential_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    write_credential(store.path(), "old_access", "old_refresh", now_epoch() - 60);

    store
        .get_valid_access_token(&FakeStrava::new())
        .await
        .unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn test_unsaved_refresh_returns_no_token() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    write_credential(store.path(), "old_access", "old_refresh", now_epoch() - 60);
    let before = std::fs::read(store.path()).unwrap();
    // A directory on the temp path makes the save fail after Strava answered.
    std::fs::create_dir(dir.path().join("token.json.tmp")).unwrap();

    let strava = FakeStrava::new();
    let result = store.get_valid_access_token(&strava).await;

    assert!(matches!(result, Err(AppError::Persist(_))));
    assert_eq!(strava.refreshes(), 1);
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}
