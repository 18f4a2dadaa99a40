// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Activity, Credential, Provider, SyncResult};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sync", post(sync_now))
        .route("/api/activities", get(get_activities))
        .route("/api/points", get(get_points))
        .route(
            "/api/connection",
            put(put_connection).delete(delete_connection),
        )
}

// ─── Sync ────────────────────────────────────────────────────

/// Run a sync for the current user and report what changed.
async fn sync_now(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncResult>> {
    tracing::info!(user_id = user.user_id, "User-initiated sync");
    let result = state.sync_service.sync(user.user_id).await?;
    Ok(Json(result))
}

// ─── Connection ──────────────────────────────────────────────

/// Credential handed over by the OAuth exchange.
#[derive(Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub expires_at: i64,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub provider_user_id: Option<u64>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectionResponse {
    pub connected: bool,
    pub expires_at: Option<String>,
}

/// Store (or replace) the user's Strava credential.
async fn put_connection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ConnectionRequest>,
) -> Result<Json<ConnectionResponse>> {
    if body.access_token.trim().is_empty() {
        return Err(AppError::BadRequest("access_token is required".to_string()));
    }
    let expires_at = DateTime::from_timestamp(body.expires_at, 0)
        .ok_or_else(|| AppError::BadRequest("expires_at is out of range".to_string()))?;

    let credential = Credential {
        user_id: user.user_id,
        provider: Provider::Strava,
        access_token: body.access_token,
        refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
        expires_at,
        scopes: body.scopes,
        provider_user_id: body.provider_user_id,
    };
    state.sync_service.connect(&credential).await?;

    Ok(Json(ConnectionResponse {
        connected: true,
        expires_at: Some(format_utc_rfc3339(expires_at)),
    }))
}

/// Disconnect Strava. Imported activities and points are kept.
async fn delete_connection(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConnectionResponse>> {
    tracing::info!(user_id = user.user_id, "User-initiated disconnect");
    // Idempotent: disconnecting twice is not an error.
    let existed = state.sync_service.disconnect(user.user_id).await?;
    if !existed {
        tracing::debug!(user_id = user.user_id, "No Strava connection to remove");
    }

    Ok(Json(ConnectionResponse {
        connected: false,
        expires_at: None,
    }))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Pagination: page number (1-indexed)
    #[serde(default = "default_page")]
    page: u32,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    50
}

const MAX_PER_PAGE: u32 = 100;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitiesResponse {
    pub activities: Vec<ActivitySummary>,
    pub page: u32,
    pub per_page: u32,
    /// Whether a later page has at least one more activity.
    pub has_more: bool,
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitySummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub provider: String,
    pub category: String,
    pub distance_meters: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub moving_time_secs: u64,
    pub calories: f64,
    pub start_date: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub points: u64,
    pub points_calculated: bool,
}

impl From<Activity> for ActivitySummary {
    fn from(a: Activity) -> Self {
        Self {
            id: a.provider_activity_id,
            provider: a.provider.to_string(),
            category: a.category,
            distance_meters: a.distance_meters,
            moving_time_secs: a.moving_time_secs,
            calories: a.calories,
            start_date: format_utc_rfc3339(a.start_date),
            points: a.points,
            points_calculated: a.points_calculated,
        }
    }
}

/// Get user's imported activities, newest first.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>> {
    tracing::debug!(
        user_id = user.user_id,
        page = params.page,
        per_page = params.per_page,
        "Fetching activities"
    );

    if params.page < 1 {
        return Err(AppError::BadRequest(
            "Page must be greater than 0".to_string(),
        ));
    }
    if params.per_page < 1 || params.per_page > MAX_PER_PAGE {
        return Err(AppError::BadRequest(format!(
            "per_page must be between 1 and {}",
            MAX_PER_PAGE
        )));
    }

    // Offsets past u32 are beyond any stored history.
    let offset = u64::from(params.page - 1) * u64::from(params.per_page);
    let mut activities = match u32::try_from(offset) {
        Ok(offset) => {
            // Fetch one extra to learn whether another page exists.
            state
                .store
                .activities_page(user.user_id, offset, params.per_page + 1)
                .await?
        }
        Err(_) => Vec::new(),
    };

    let has_more = activities.len() > params.per_page as usize;
    activities.truncate(params.per_page as usize);

    Ok(Json(ActivitiesResponse {
        activities: activities.into_iter().map(ActivitySummary::from).collect(),
        page: params.page,
        per_page: params.per_page,
        has_more,
    }))
}

// ─── Points ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PointsResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_points: u64,
    pub eligible_activities: u32,
    /// When the total was last reconciled; absent if never.
    pub updated_at: Option<String>,
}

/// Get the user's stored point total.
async fn get_points(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PointsResponse>> {
    let response = match state.store.get_user_points(user.user_id).await? {
        Some(points) => PointsResponse {
            total_points: points.total_points,
            eligible_activities: points.eligible_activities,
            updated_at: Some(format_utc_rfc3339(points.updated_at)),
        },
        None => PointsResponse {
            total_points: 0,
            eligible_activities: 0,
            updated_at: None,
        },
    };
    Ok(Json(response))
}
