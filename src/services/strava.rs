// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for listing activities.
//!
//! Handles:
//! - Paginated activity listing with an `after` filter
//! - Deauthorization on disconnect
//! - Status mapping onto [`ProviderError`] (401/403 re-auth, 429 rate limit)

use crate::error::ProviderError;
use crate::models::{Credential, Provider};
use crate::services::provider::{ActivityPage, ActivityProvider, ProviderActivity};
use crate::time_utils::parse_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://www.strava.com/api/v3";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://www.strava.com/oauth";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base_url: String,
    oauth_base_url: String,
}

impl StravaClient {
    /// Create a client against the public Strava endpoints.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_base_urls(DEFAULT_API_BASE_URL, DEFAULT_OAUTH_BASE_URL, timeout)
    }

    /// Create a client against custom endpoints (local fakes, proxies).
    pub fn with_base_urls(
        api_base_url: &str,
        oauth_base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transient(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            oauth_base_url: oauth_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List activities (paginated), raw Strava shape.
    pub async fn list_activity_summaries(
        &self,
        access_token: &str,
        after: i64, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, ProviderError> {
        let url = format!("{}/athlete/activities", self.api_base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(request_error)?;

        let response = check_response(response).await?;

        let body = response.bytes().await.map_err(request_error)?;
        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Malformed(format!("JSON parse error: {}", e)))
    }

    /// Deauthorize the application for a user.
    ///
    /// POST https://www.strava.com/oauth/deauthorize
    /// Authorization: Bearer {access_token}
    pub async fn deauthorize_token(&self, access_token: &str) -> Result<(), ProviderError> {
        let url = format!("{}/deauthorize", self.oauth_base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;

        check_response(response).await?;
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }
}

fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Transient(format!("request timed out: {}", e))
    } else {
        ProviderError::Transient(e.to_string())
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        401 | 403 => Err(ProviderError::Unauthorized),
        429 => {
            tracing::warn!("Strava rate limit hit (429)");
            Err(ProviderError::RateLimited)
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ProviderError::Transient(format!("HTTP {}: {}", status, body)))
        }
    }
}

#[async_trait]
impl ActivityProvider for StravaClient {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    async fn list_activities(
        &self,
        credential: &Credential,
        after: DateTime<Utc>,
        page: u32,
        per_page: u32,
    ) -> Result<ActivityPage, ProviderError> {
        let summaries = self
            .list_activity_summaries(&credential.access_token, after.timestamp(), page, per_page)
            .await?;

        let is_last = summaries.len() < per_page as usize;
        let items = summaries
            .into_iter()
            .map(StravaActivitySummary::into_provider_activity)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ActivityPage { items, is_last })
    }

    async fn deauthorize(&self, credential: &Credential) -> Result<(), ProviderError> {
        self.deauthorize_token(&credential.access_token).await
    }
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub sport_type: Option<String>,
    /// Legacy category field, used when `sport_type` is missing.
    #[serde(rename = "type", default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub moving_time: Option<u64>,
    /// Kilocalories. List responses often omit this.
    #[serde(default)]
    pub calories: Option<f64>,
    pub start_date: String,
}

impl StravaActivitySummary {
    /// Normalize into the engine's shape. Missing category or an unparsable
    /// start date is a malformed response.
    pub fn into_provider_activity(self) -> Result<ProviderActivity, ProviderError> {
        let category = self
            .sport_type
            .filter(|s| !s.trim().is_empty())
            .or(self.activity_type.filter(|s| !s.trim().is_empty()))
            .ok_or_else(|| {
                ProviderError::Malformed(format!("activity {} has no sport type", self.id))
            })?;

        let start_date = parse_utc_rfc3339(&self.start_date).ok_or_else(|| {
            ProviderError::Malformed(format!(
                "activity {} has invalid start_date {:?}",
                self.id, self.start_date
            ))
        })?;

        Ok(ProviderActivity {
            provider_activity_id: self.id,
            category,
            distance_meters: self.distance.unwrap_or(0.0),
            moving_time_secs: self.moving_time.unwrap_or(0),
            calories: self.calories.unwrap_or(0.0),
            start_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(json: &str) -> StravaActivitySummary {
        serde_json::from_str(json).expect("summary should deserialize")
    }

    #[test]
    fn test_summary_normalizes_fields() {
        let summary = parse(
            r#"{"id": 42, "sport_type": "TrailRun", "type": "Run", "distance": 8123.4,
                "moving_time": 2900, "calories": 612.5, "start_date": "2024-04-02T05:10:00Z",
                "name": "Dawn"}"#,
        );
        let activity = summary.into_provider_activity().unwrap();

        assert_eq!(activity.provider_activity_id, 42);
        assert_eq!(activity.category, "TrailRun");
        assert_eq!(activity.distance_meters, 8123.4);
        assert_eq!(activity.moving_time_secs, 2900);
        assert_eq!(activity.calories, 612.5);
        assert_eq!(
            activity.start_date,
            Utc.with_ymd_and_hms(2024, 4, 2, 5, 10, 0).unwrap()
        );
    }

    #[test]
    fn test_summary_falls_back_to_legacy_type() {
        let summary = parse(r#"{"id": 1, "type": "Swim", "start_date": "2024-04-02T05:10:00Z"}"#);
        let activity = summary.into_provider_activity().unwrap();
        assert_eq!(activity.category, "Swim");
        assert_eq!(activity.distance_meters, 0.0);
        assert_eq!(activity.moving_time_secs, 0);
        assert_eq!(activity.calories, 0.0);
    }

    #[test]
    fn test_summary_without_category_is_malformed() {
        let summary = parse(r#"{"id": 1, "sport_type": "", "start_date": "2024-04-02T05:10:00Z"}"#);
        assert!(matches!(
            summary.into_provider_activity(),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_summary_with_bad_date_is_malformed() {
        let summary = parse(r#"{"id": 1, "sport_type": "Run", "start_date": "yesterday"}"#);
        assert!(matches!(
            summary.into_provider_activity(),
            Err(ProviderError::Malformed(_))
        ));
    }
}
