// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, with an in-memory backend for local runs and tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::StoreError;
use crate::models::{Activity, Provider, StoredCredential, User, UserPoints};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Encrypted provider credentials (keyed by `{provider}_{user_id}`)
    pub const CREDENTIALS: &str = "credentials";
    /// Imported activities (keyed by `{provider}_{provider_activity_id}`)
    pub const ACTIVITIES: &str = "activities";
    /// Point totals (keyed by user_id)
    pub const USER_POINTS: &str = "user_points";
}

/// Durable storage used by the sync engine.
///
/// Every method is a single atomic document operation. `insert_activity`
/// must fail with [`StoreError::Conflict`] when the key already exists.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, StoreError>;

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError>;

    // ─── Credentials ─────────────────────────────────────────────

    async fn get_credential(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<StoredCredential>, StoreError>;

    /// Create or replace the credential for `(credential.user_id, credential.provider)`.
    async fn set_credential(&self, credential: &StoredCredential) -> Result<(), StoreError>;

    /// Delete a credential. Returns `true` if one existed.
    async fn delete_credential(&self, user_id: u64, provider: Provider)
        -> Result<bool, StoreError>;

    // ─── Activities ──────────────────────────────────────────────

    async fn get_activity(
        &self,
        provider: Provider,
        provider_activity_id: u64,
    ) -> Result<Option<Activity>, StoreError>;

    /// Insert a new activity; `Conflict` if the key is taken.
    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError>;

    /// Overwrite an existing activity.
    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError>;

    /// All activities owned by a user, across providers, in no particular order.
    async fn activities_for_user(&self, user_id: u64) -> Result<Vec<Activity>, StoreError>;

    /// Start instant of the user's newest activity from `provider`.
    async fn latest_activity_start(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// A window of the user's activities, newest first. Equal starts are
    /// ordered by provider activity ID, descending.
    async fn activities_page(
        &self,
        user_id: u64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Activity>, StoreError>;

    // ─── Point totals ────────────────────────────────────────────

    async fn get_user_points(&self, user_id: u64) -> Result<Option<UserPoints>, StoreError>;

    async fn set_user_points(&self, points: &UserPoints) -> Result<(), StoreError>;
}
