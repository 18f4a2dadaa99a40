// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use golden_runners::config::Config;
use golden_runners::db::{FirestoreDb, MemoryDb, Store};
use golden_runners::error::ProviderError;
use golden_runners::middleware::auth::create_jwt;
use golden_runners::models::{Credential, Provider, User};
use golden_runners::routes::create_router;
use golden_runners::services::{
    ActivityPage, ActivityProvider, KmsService, ProviderActivity, RateTable, SyncService,
    SyncSettings,
};
use golden_runners::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Fixed clock for sync scenarios.
#[allow(dead_code)]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap()
}

/// A provider activity with 30 minutes of moving time.
#[allow(dead_code)]
pub fn activity(id: u64, category: &str, meters: f64, start: DateTime<Utc>) -> ProviderActivity {
    ProviderActivity {
        provider_activity_id: id,
        category: category.to_string(),
        distance_meters: meters,
        moving_time_secs: 1800,
        calories: 0.0,
        start_date: start,
    }
}

/// One recorded `list_activities` call.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub struct ListCall {
    pub after: DateTime<Utc>,
    pub page: u32,
    pub per_page: u32,
}

/// In-process provider that serves a fixed activity history the way Strava
/// does: filtered by `after`, oldest first, sliced into pages.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedProvider {
    history: Mutex<Vec<ProviderActivity>>,
    /// Return the whole history regardless of `after` (overlapping windows).
    ignore_after: Mutex<bool>,
    fail_on_page: Mutex<Option<(u32, ProviderError)>>,
    calls: Mutex<Vec<ListCall>>,
    deauthorized: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(history: Vec<ProviderActivity>) -> Arc<Self> {
        let provider = Self::default();
        provider.set_history(history);
        Arc::new(provider)
    }

    pub fn set_history(&self, mut history: Vec<ProviderActivity>) {
        history.sort_by_key(|a| a.start_date);
        *self.history.lock().unwrap() = history;
    }

    pub fn ignore_after(&self, ignore: bool) {
        *self.ignore_after.lock().unwrap() = ignore;
    }

    pub fn fail_on_page(&self, page: u32, err: ProviderError) {
        *self.fail_on_page.lock().unwrap() = Some((page, err));
    }

    pub fn calls(&self) -> Vec<ListCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn deauthorize_count(&self) -> usize {
        self.deauthorized.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityProvider for ScriptedProvider {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    async fn list_activities(
        &self,
        _credential: &Credential,
        after: DateTime<Utc>,
        page: u32,
        per_page: u32,
    ) -> Result<ActivityPage, ProviderError> {
        self.calls.lock().unwrap().push(ListCall {
            after,
            page,
            per_page,
        });

        if let Some((fail_page, err)) = self.fail_on_page.lock().unwrap().clone() {
            if fail_page == page {
                return Err(err);
            }
        }

        let ignore_after = *self.ignore_after.lock().unwrap();
        let visible: Vec<ProviderActivity> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|a| ignore_after || a.start_date > after)
            .cloned()
            .collect();

        let start = (page as usize - 1) * per_page as usize;
        let items: Vec<ProviderActivity> = visible
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        let is_last = items.len() < per_page as usize;

        Ok(ActivityPage { items, is_last })
    }

    async fn deauthorize(&self, _credential: &Credential) -> Result<(), ProviderError> {
        self.deauthorized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Small pages so pagination is exercised with a handful of activities.
#[allow(dead_code)]
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        page_size: 2,
        max_pages: 5,
        ..SyncSettings::default()
    }
}

/// Sync service over an in-memory store and mock KMS.
#[allow(dead_code)]
pub struct Harness {
    pub db: MemoryDb,
    pub provider: Arc<ScriptedProvider>,
    pub service: SyncService,
}

#[allow(dead_code)]
pub fn harness(provider: Arc<ScriptedProvider>) -> Harness {
    harness_with(provider, RateTable::default(), test_settings())
}

#[allow(dead_code)]
pub fn harness_with(
    provider: Arc<ScriptedProvider>,
    rates: RateTable,
    settings: SyncSettings,
) -> Harness {
    let db = MemoryDb::new();
    let service = service_over(&db, provider.clone(), rates, settings);
    Harness {
        db,
        provider,
        service,
    }
}

/// A second sync service sharing `db`, e.g. after a rate table change.
#[allow(dead_code)]
pub fn service_over(
    db: &MemoryDb,
    provider: Arc<ScriptedProvider>,
    rates: RateTable,
    settings: SyncSettings,
) -> SyncService {
    SyncService::new(
        Arc::new(db.clone()),
        Arc::new(KmsService::new_mock()),
        provider,
        Arc::new(rates),
        settings,
    )
}

/// Credential for `user_id` expiring at `expires_at`.
#[allow(dead_code)]
pub fn credential(user_id: u64, expires_at: DateTime<Utc>) -> Credential {
    Credential {
        user_id,
        provider: Provider::Strava,
        access_token: format!("access-{}", user_id),
        refresh_token: Some(format!("refresh-{}", user_id)),
        expires_at,
        scopes: vec!["activity:read_all".to_string()],
        provider_user_id: Some(user_id + 1000),
    }
}

/// Connect `user_id` with a credential valid for an hour past [`now`].
#[allow(dead_code)]
pub async fn connect(service: &SyncService, user_id: u64) {
    service
        .connect(&credential(user_id, now() + Duration::hours(1)))
        .await
        .expect("connect should succeed");
}

#[allow(dead_code)]
pub async fn register(db: &MemoryDb, user_id: u64, registered_at: Option<DateTime<Utc>>) {
    db.upsert_user(&User {
        user_id,
        display_name: format!("Runner {}", user_id),
        registered_at,
    })
    .await
    .expect("upsert user");
}

/// Create a test app over an in-memory store and a scripted provider.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app(
    provider: Arc<ScriptedProvider>,
) -> (axum::Router, Arc<AppState>, MemoryDb) {
    let config = Config::default();
    let db = MemoryDb::new();
    let store: Arc<dyn Store> = Arc::new(db.clone());

    let sync_service = SyncService::new(
        store.clone(),
        Arc::new(KmsService::new_mock()),
        provider,
        Arc::new(RateTable::default()),
        test_settings(),
    );

    let state = Arc::new(AppState {
        config,
        store,
        sync_service,
    });

    (create_router(state.clone()), state, db)
}

/// Session token for `user_id`, as the login service would issue it.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, signing_key: &[u8]) -> String {
    create_jwt(user_id, signing_key).expect("Failed to create JWT")
}
