// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Imported activity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Provider;

/// Stored activity record in Firestore.
///
/// Unique per `(provider, provider_activity_id)`; see [`Activity::document_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Provider the activity was imported from
    pub provider: Provider,
    /// Provider-assigned activity ID
    pub provider_activity_id: u64,
    /// Owning application user ID
    pub user_id: u64,
    /// Provider category ("Run", "Ride", "Swim", ...)
    pub category: String,
    /// Distance in meters (0 when the provider sent none)
    pub distance_meters: f64,
    /// Moving time in seconds
    pub moving_time_secs: u64,
    /// Energy in kilocalories (0 when the provider sent none)
    #[serde(default)]
    pub calories: f64,
    /// Start instant (UTC)
    pub start_date: DateTime<Utc>,
    /// Points awarded at import time
    pub points: u64,
    /// Whether `points` is final for this activity
    pub points_calculated: bool,
    /// When this activity was first imported
    pub imported_at: DateTime<Utc>,
    /// Last time the stored record changed
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// Document ID for an activity key.
    pub fn document_id_for(provider: Provider, provider_activity_id: u64) -> String {
        format!("{}_{}", provider, provider_activity_id)
    }

    pub fn document_id(&self) -> String {
        Self::document_id_for(self.provider, self.provider_activity_id)
    }
}
