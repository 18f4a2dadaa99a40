// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use golden_runners::error::{AppError, ProviderError, StoreError, SyncError};

#[test]
fn test_provider_errors_map_to_sync_errors() {
    assert_eq!(
        SyncError::from(ProviderError::Unauthorized),
        SyncError::NeedsReauth
    );
    assert!(matches!(
        SyncError::from(ProviderError::RateLimited),
        SyncError::ProviderTransient(_)
    ));
    assert!(matches!(
        SyncError::from(ProviderError::Transient("timeout".to_string())),
        SyncError::ProviderTransient(_)
    ));
    assert!(matches!(
        SyncError::from(ProviderError::Malformed("bad json".to_string())),
        SyncError::ProviderMalformed(_)
    ));
}

#[test]
fn test_store_errors_map_to_storage_unavailable() {
    assert!(matches!(
        SyncError::from(StoreError::Unavailable("down".to_string())),
        SyncError::StorageUnavailable(_)
    ));
}

#[test]
fn test_sync_error_status_codes() {
    let cases = [
        (SyncError::NeedsReauth, StatusCode::CONFLICT, "needs_reauth"),
        (
            SyncError::ProviderTransient("x".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
            "provider_unavailable",
        ),
        (
            SyncError::ProviderMalformed("x".to_string()),
            StatusCode::BAD_GATEWAY,
            "provider_error",
        ),
        (
            SyncError::StorageUnavailable("x".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
            "database_error",
        ),
    ];

    for (err, status, code) in cases {
        assert_eq!(AppError::Sync(err).status_and_code(), (status, code));
    }
}

#[test]
fn test_bad_request_response_status() {
    let response = AppError::BadRequest("page".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
