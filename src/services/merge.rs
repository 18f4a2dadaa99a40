// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Deduplication and upsert of fetched activities.
//!
//! Activities are keyed by `(provider, provider_activity_id)`. A re-import
//! never creates a second record; an existing record is only rewritten when
//! it was stored without points and its category has since become eligible.

use crate::db::Store;
use crate::error::StoreError;
use crate::models::{Activity, Provider};
use crate::services::points::compute_points;
use crate::services::provider::ProviderActivity;
use crate::services::rates::RateTable;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What `merge` did with one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    UpdatedForPoints,
    Skipped,
}

#[derive(Clone)]
pub struct ActivityMerger {
    store: Arc<dyn Store>,
    rates: Arc<RateTable>,
}

impl ActivityMerger {
    pub fn new(store: Arc<dyn Store>, rates: Arc<RateTable>) -> Self {
        Self { store, rates }
    }

    /// Merge one fetched activity for `user_id`.
    ///
    /// Activities that started before `registered_at` are skipped without
    /// being stored.
    pub async fn merge(
        &self,
        user_id: u64,
        provider: Provider,
        registered_at: Option<DateTime<Utc>>,
        fetched: &ProviderActivity,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome, StoreError> {
        let activity_id = fetched.provider_activity_id;

        if let Some(registered_at) = registered_at {
            if fetched.start_date < registered_at {
                tracing::debug!(
                    user_id,
                    activity_id,
                    start_date = %fetched.start_date,
                    "Skipping activity that predates registration"
                );
                return Ok(MergeOutcome::Skipped);
            }
        }

        if let Some(existing) = self.store.get_activity(provider, activity_id).await? {
            return self.merge_existing(user_id, existing, fetched, now).await;
        }

        let eligible = self.rates.is_eligible(&fetched.category);
        let points = if eligible {
            compute_points(fetched, &self.rates)
        } else {
            0
        };

        let activity = Activity {
            provider,
            provider_activity_id: activity_id,
            user_id,
            category: fetched.category.clone(),
            distance_meters: fetched.distance_meters,
            moving_time_secs: fetched.moving_time_secs,
            calories: fetched.calories,
            start_date: fetched.start_date,
            points,
            points_calculated: eligible,
            imported_at: now,
            updated_at: now,
        };

        match self.store.insert_activity(&activity).await {
            Ok(()) => {
                tracing::debug!(
                    user_id,
                    activity_id,
                    category = %activity.category,
                    points,
                    eligible,
                    "Inserted activity"
                );
                Ok(MergeOutcome::Inserted)
            }
            Err(StoreError::Conflict(_)) => {
                // Someone else inserted between our read and write.
                tracing::warn!(user_id, activity_id, "Insert conflict, re-reading activity");
                match self.store.get_activity(provider, activity_id).await? {
                    Some(existing) => self.merge_existing(user_id, existing, fetched, now).await,
                    None => {
                        tracing::warn!(
                            user_id,
                            activity_id,
                            "Conflicting activity vanished before re-read"
                        );
                        Ok(MergeOutcome::Skipped)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn merge_existing(
        &self,
        user_id: u64,
        mut existing: Activity,
        fetched: &ProviderActivity,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome, StoreError> {
        let activity_id = existing.provider_activity_id;

        if existing.user_id != user_id {
            tracing::warn!(
                user_id,
                owner = existing.user_id,
                activity_id,
                "Activity already imported for a different user"
            );
            return Ok(MergeOutcome::Skipped);
        }

        if existing.points_calculated || !self.rates.is_eligible(&fetched.category) {
            return Ok(MergeOutcome::Skipped);
        }

        existing.category = fetched.category.clone();
        existing.distance_meters = fetched.distance_meters;
        existing.moving_time_secs = fetched.moving_time_secs;
        existing.calories = fetched.calories;
        existing.points = compute_points(fetched, &self.rates);
        existing.points_calculated = true;
        existing.updated_at = now;

        self.store.update_activity(&existing).await?;
        tracing::debug!(
            user_id,
            activity_id,
            category = %existing.category,
            points = existing.points,
            "Activity became eligible, points assigned"
        );
        Ok(MergeOutcome::UpdatedForPoints)
    }
}
