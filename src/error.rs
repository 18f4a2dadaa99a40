// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the sync engine and consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::credentials::CredentialError;

/// Durable store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A document with the same key already exists (unique-key race).
    #[error("Document already exists: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Provider (Strava) API failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Credential rejected by the provider. Never retried.
    #[error("Provider rejected the access token")]
    Unauthorized,

    #[error("Provider rate limit exceeded")]
    RateLimited,

    #[error("Provider request failed: {0}")]
    Transient(String),

    #[error("Unexpected provider response: {0}")]
    Malformed(String),
}

/// Outcome of a sync run that did not reach `Done`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Credential missing, expired or rejected. The user has to reconnect.
    #[error("Provider connection needs to be re-authorized")]
    NeedsReauth,

    #[error("Provider temporarily unavailable: {0}")]
    ProviderTransient(String),

    #[error("Provider returned malformed data: {0}")]
    ProviderMalformed(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<ProviderError> for SyncError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized => SyncError::NeedsReauth,
            ProviderError::RateLimited => {
                SyncError::ProviderTransient("rate limit exceeded".to_string())
            }
            ProviderError::Transient(msg) => SyncError::ProviderTransient(msg),
            ProviderError::Malformed(msg) => SyncError::ProviderMalformed(msg),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        // Conflicts are resolved inside the merge layer; one reaching here
        // means the store could not settle the row.
        SyncError::StorageUnavailable(err.to_string())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Storage(e) => e.into(),
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Status code and stable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Sync(SyncError::NeedsReauth) => (StatusCode::CONFLICT, "needs_reauth"),
            AppError::Sync(SyncError::ProviderTransient(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable")
            }
            AppError::Sync(SyncError::ProviderMalformed(_)) => {
                (StatusCode::BAD_GATEWAY, "provider_error")
            }
            AppError::Sync(SyncError::StorageUnavailable(_)) | AppError::Database(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "database_error")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        let details = match &self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => Some(msg.clone()),
            AppError::Sync(SyncError::NeedsReauth) => {
                Some("Reconnect your Strava account to continue syncing".to_string())
            }
            AppError::Sync(SyncError::ProviderTransient(_)) => {
                Some("Strava is unavailable right now, try again later".to_string())
            }
            AppError::Sync(SyncError::ProviderMalformed(msg)) => {
                tracing::error!(error = %msg, "Malformed provider data");
                Some("Strava returned data we could not read".to_string())
            }
            AppError::Sync(SyncError::StorageUnavailable(msg)) | AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            AppError::Unauthorized => None,
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
