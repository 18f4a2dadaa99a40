// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider client seam used by the sync engine.

use crate::error::ProviderError;
use crate::models::{Credential, Provider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One activity as reported by the provider, normalized to UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderActivity {
    pub provider_activity_id: u64,
    pub category: String,
    /// Meters; 0 when the provider sent none.
    pub distance_meters: f64,
    pub moving_time_secs: u64,
    /// Kilocalories; 0 when the provider sent none.
    pub calories: f64,
    pub start_date: DateTime<Utc>,
}

/// One page of the provider's activity list.
#[derive(Debug, Clone, Default)]
pub struct ActivityPage {
    pub items: Vec<ProviderActivity>,
    /// True when the provider returned fewer items than requested.
    pub is_last: bool,
}

/// Read access to a user's activity history at an external provider.
#[async_trait]
pub trait ActivityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// List activities that started strictly after `after`, 1-indexed `page`.
    async fn list_activities(
        &self,
        credential: &Credential,
        after: DateTime<Utc>,
        page: u32,
        per_page: u32,
    ) -> Result<ActivityPage, ProviderError>;

    /// Revoke the application's access at the provider.
    async fn deauthorize(&self, credential: &Credential) -> Result<(), ProviderError>;
}
