// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store backed by `DashMap`.
//!
//! Used for local development without the Firestore emulator and by the test
//! suite. Insert uniqueness is enforced through the map's entry API, so the
//! conflict path behaves like Firestore's `AlreadyExists`.

use crate::db::Store;
use crate::error::StoreError;
use crate::models::{Activity, Provider, StoredCredential, User, UserPoints};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    users: DashMap<u64, User>,
    credentials: DashMap<(u64, Provider), StoredCredential>,
    activities: DashMap<(Provider, u64), Activity>,
    points: DashMap<u64, UserPoints>,
    offline: AtomicBool,
}

/// In-memory database. Cloning shares the same underlying maps.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of stored activities (all users).
    pub fn activity_count(&self) -> usize {
        self.inner.activities.len()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "Database not connected (offline mode)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_user(&self, user_id: u64) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        Ok(self.inner.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn get_credential(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<StoredCredential>, StoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .credentials
            .get(&(user_id, provider))
            .map(|c| c.value().clone()))
    }

    async fn set_credential(&self, credential: &StoredCredential) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner.credentials.insert(
            (credential.user_id, credential.provider),
            credential.clone(),
        );
        Ok(())
    }

    async fn delete_credential(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<bool, StoreError> {
        self.check_online()?;
        Ok(self.inner.credentials.remove(&(user_id, provider)).is_some())
    }

    async fn get_activity(
        &self,
        provider: Provider,
        provider_activity_id: u64,
    ) -> Result<Option<Activity>, StoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .activities
            .get(&(provider, provider_activity_id))
            .map(|a| a.value().clone()))
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.check_online()?;
        match self
            .inner
            .activities
            .entry((activity.provider, activity.provider_activity_id))
        {
            Entry::Occupied(_) => Err(StoreError::Conflict(activity.document_id())),
            Entry::Vacant(slot) => {
                slot.insert(activity.clone());
                Ok(())
            }
        }
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner.activities.insert(
            (activity.provider, activity.provider_activity_id),
            activity.clone(),
        );
        Ok(())
    }

    async fn activities_for_user(&self, user_id: u64) -> Result<Vec<Activity>, StoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .activities
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn latest_activity_start(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .activities
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.provider == provider)
            .map(|entry| entry.start_date)
            .max())
    }

    async fn activities_page(
        &self,
        user_id: u64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Activity>, StoreError> {
        let mut activities = self.activities_for_user(user_id).await?;
        activities.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then(b.provider_activity_id.cmp(&a.provider_activity_id))
        });
        Ok(activities
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_user_points(&self, user_id: u64) -> Result<Option<UserPoints>, StoreError> {
        self.check_online()?;
        Ok(self.inner.points.get(&user_id).map(|p| p.value().clone()))
    }

    async fn set_user_points(&self, points: &UserPoints) -> Result<(), StoreError> {
        self.check_online()?;
        self.inner.points.insert(points.user_id, points.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_activity(id: u64, user_id: u64) -> Activity {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        Activity {
            provider: Provider::Strava,
            provider_activity_id: id,
            user_id,
            category: "Run".to_string(),
            distance_meters: 5000.0,
            moving_time_secs: 1500,
            calories: 0.0,
            start_date: start,
            points: 5,
            points_calculated: true,
            imported_at: start,
            updated_at: start,
        }
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_existing_key() {
        let db = MemoryDb::new();
        db.insert_activity(&make_activity(1, 7)).await.unwrap();

        let err = db.insert_activity(&make_activity(1, 7)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref id) if id == "strava_1"));
        assert_eq!(db.activity_count(), 1);
    }

    #[tokio::test]
    async fn test_activities_for_user_filters_owner() {
        let db = MemoryDb::new();
        db.insert_activity(&make_activity(1, 7)).await.unwrap();
        db.insert_activity(&make_activity(2, 7)).await.unwrap();
        db.insert_activity(&make_activity(3, 8)).await.unwrap();

        let mut ids: Vec<u64> = db
            .activities_for_user(7)
            .await
            .unwrap()
            .iter()
            .map(|a| a.provider_activity_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_latest_start_is_per_user_and_provider() {
        let db = MemoryDb::new();
        assert!(db
            .latest_activity_start(7, Provider::Strava)
            .await
            .unwrap()
            .is_none());

        let mut older = make_activity(1, 7);
        older.start_date = Utc.with_ymd_and_hms(2024, 4, 1, 7, 0, 0).unwrap();
        let mut other_user = make_activity(3, 8);
        other_user.start_date = Utc.with_ymd_and_hms(2024, 9, 1, 7, 0, 0).unwrap();
        db.insert_activity(&older).await.unwrap();
        db.insert_activity(&make_activity(2, 7)).await.unwrap();
        db.insert_activity(&other_user).await.unwrap();

        assert_eq!(
            db.latest_activity_start(7, Provider::Strava).await.unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_activities_page_is_newest_first() {
        let db = MemoryDb::new();
        for (id, day) in [(1, 3), (2, 5), (3, 5), (4, 1)] {
            let mut activity = make_activity(id, 7);
            activity.start_date = Utc.with_ymd_and_hms(2024, 5, day, 7, 0, 0).unwrap();
            db.insert_activity(&activity).await.unwrap();
        }

        let ids = |page: Vec<Activity>| -> Vec<u64> {
            page.iter().map(|a| a.provider_activity_id).collect()
        };
        assert_eq!(ids(db.activities_page(7, 0, 3).await.unwrap()), vec![3, 2, 1]);
        assert_eq!(ids(db.activities_page(7, 3, 3).await.unwrap()), vec![4]);
        assert!(db.activities_page(7, 10, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_mode_fails_every_call() {
        let db = MemoryDb::new();
        db.set_offline(true);

        let result = db.get_user(1).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        db.set_offline(false);
        assert!(db.get_user(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_credential_reports_existence() {
        let db = MemoryDb::new();
        let credential = StoredCredential {
            user_id: 7,
            provider: Provider::Strava,
            access_token_encrypted: "enc".to_string(),
            refresh_token_encrypted: None,
            expires_at: "2030-01-01T00:00:00Z".to_string(),
            scopes: vec![],
            provider_user_id: None,
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };
        db.set_credential(&credential).await.unwrap();

        assert!(db.delete_credential(7, Provider::Strava).await.unwrap());
        assert!(!db.delete_credential(7, Provider::Strava).await.unwrap());
    }
}
