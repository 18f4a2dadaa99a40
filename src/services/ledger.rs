// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point ledger reconciliation.
//!
//! The stored total is always recomputed from the full activity set and
//! written in one document write. Never incremented.

use crate::db::Store;
use crate::error::StoreError;
use crate::models::{Activity, UserPoints};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Sum the points of contributing activities.
///
/// An activity contributes iff its points are calculated and it did not
/// start before `registered_at`. Returns `(total, contributing_count)`.
pub fn total_points(activities: &[Activity], registered_at: Option<DateTime<Utc>>) -> (u64, u32) {
    activities
        .iter()
        .filter(|a| a.points_calculated)
        .filter(|a| match registered_at {
            Some(registered_at) => a.start_date >= registered_at,
            None => true,
        })
        .fold((0u64, 0u32), |(total, count), a| {
            (total.saturating_add(a.points), count.saturating_add(1))
        })
}

#[derive(Clone)]
pub struct LedgerReconciler {
    store: Arc<dyn Store>,
}

impl LedgerReconciler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Recompute and persist the user's total as of `now`. Returns the new total.
    pub async fn reconcile(&self, user_id: u64, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let registered_at = self
            .store
            .get_user(user_id)
            .await?
            .and_then(|u| u.registered_at);
        let activities = self.store.activities_for_user(user_id).await?;
        let (total, count) = total_points(&activities, registered_at);

        self.store
            .set_user_points(&UserPoints {
                user_id,
                total_points: total,
                eligible_activities: count,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            user_id,
            total_points = total,
            eligible_activities = count,
            "Reconciled point total"
        );
        Ok(total)
    }

    /// Stored total, 0 if never reconciled.
    pub async fn current_total(&self, user_id: u64) -> Result<u64, StoreError> {
        Ok(self
            .store
            .get_user_points(user_id)
            .await?
            .map(|p| p.total_points)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::models::{Provider, User};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 7, 0, 0).unwrap()
    }

    fn activity(id: u64, user_id: u64, points: u64, calculated: bool, day: u32) -> Activity {
        let start = at(day);
        Activity {
            provider: Provider::Strava,
            provider_activity_id: id,
            user_id,
            category: "Run".to_string(),
            distance_meters: points as f64 * 1000.0,
            moving_time_secs: 1200,
            calories: 0.0,
            start_date: start,
            points,
            points_calculated: calculated,
            imported_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_total_counts_only_calculated() {
        let activities = vec![
            activity(1, 1, 5, true, 1),
            activity(2, 1, 0, true, 2),
            activity(3, 1, 9, false, 3),
        ];
        assert_eq!(total_points(&activities, None), (5, 2));
    }

    #[test]
    fn test_total_respects_registration_floor() {
        let activities = vec![activity(1, 1, 5, true, 1), activity(2, 1, 7, true, 10)];
        let registered = Utc.with_ymd_and_hms(2024, 6, 10, 7, 0, 0).unwrap();
        assert_eq!(total_points(&activities, Some(registered)), (7, 1));
    }

    #[test]
    fn test_total_saturates() {
        let activities = vec![activity(1, 1, u64::MAX, true, 1), activity(2, 1, 1, true, 2)];
        assert_eq!(total_points(&activities, None).0, u64::MAX);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let db = MemoryDb::new();
        db.insert_activity(&activity(1, 4, 5, true, 1)).await.unwrap();
        db.insert_activity(&activity(2, 4, 12, true, 2)).await.unwrap();
        db.insert_activity(&activity(3, 5, 100, true, 2)).await.unwrap();
        let ledger = LedgerReconciler::new(Arc::new(db.clone()));

        assert_eq!(ledger.reconcile(4, at(20)).await.unwrap(), 17);
        assert_eq!(ledger.reconcile(4, at(21)).await.unwrap(), 17);

        let stored = db.get_user_points(4).await.unwrap().unwrap();
        assert_eq!(stored.total_points, 17);
        assert_eq!(stored.eligible_activities, 2);
        assert_eq!(stored.updated_at, at(21));
    }

    #[tokio::test]
    async fn test_reconcile_reads_registration_from_user() {
        let db = MemoryDb::new();
        db.upsert_user(&User {
            user_id: 4,
            display_name: "Ana".to_string(),
            registered_at: Some(Utc.with_ymd_and_hms(2024, 6, 5, 0, 0, 0).unwrap()),
        })
        .await
        .unwrap();
        db.insert_activity(&activity(1, 4, 5, true, 1)).await.unwrap();
        db.insert_activity(&activity(2, 4, 12, true, 6)).await.unwrap();

        let ledger = LedgerReconciler::new(Arc::new(db));
        assert_eq!(ledger.reconcile(4, at(20)).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_current_total_defaults_to_zero() {
        let ledger = LedgerReconciler::new(Arc::new(MemoryDb::new()));
        assert_eq!(ledger.current_total(9).await.unwrap(), 0);
    }
}
