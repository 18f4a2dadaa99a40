// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile, registration instant)
//! - Credentials (encrypted OAuth tokens)
//! - Activities (imported provider activities)
//! - User points (reconciled totals)
//!
//! `start_date` is stored as an RFC3339 string. Provider start instants have
//! whole-second precision, so string order on that field is time order.

use crate::db::{collections, Store};
use crate::error::StoreError;
use crate::models::{Activity, Provider, StoredCredential, User, UserPoints};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::FirestoreQueryDirection;
use firestore::errors::FirestoreError;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client for testing (offline mode).
    ///
    /// All database operations will return `StoreError::Unavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or_else(|| {
            StoreError::Unavailable("Database not connected (offline mode)".to_string())
        })
    }
}

/// Map Firestore errors onto the store taxonomy. `AlreadyExists` surfaces as
/// `DataConflictError`.
fn map_err(e: FirestoreError) -> StoreError {
    match e {
        FirestoreError::DataConflictError(_) => StoreError::Conflict(e.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: u64) -> Result<Option<User>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(map_err)
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.user_id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(map_err)?;
        Ok(())
    }

    // ─── Credential Operations ───────────────────────────────────

    async fn get_credential(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<StoredCredential>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(&StoredCredential::document_id_for(user_id, provider))
            .await
            .map_err(map_err)
    }

    async fn set_credential(&self, credential: &StoredCredential) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(StoredCredential::document_id_for(
                credential.user_id,
                credential.provider,
            ))
            .object(credential)
            .execute()
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_credential(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<bool, StoreError> {
        let existed = self.get_credential(user_id, provider).await?.is_some();
        if !existed {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::CREDENTIALS)
            .document_id(StoredCredential::document_id_for(user_id, provider))
            .execute()
            .await
            .map_err(map_err)?;
        Ok(true)
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(
        &self,
        provider: Provider,
        provider_activity_id: u64,
    ) -> Result<Option<Activity>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(&Activity::document_id_for(provider, provider_activity_id))
            .await
            .map_err(map_err)
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        // `insert` is a create-only write: Firestore rejects it with
        // AlreadyExists when another run stored the same activity first.
        let _: Activity = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ACTIVITIES)
            .document_id(activity.document_id())
            .object(activity)
            .execute()
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(activity.document_id())
            .object(activity)
            .execute()
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn activities_for_user(&self, user_id: u64) -> Result<Vec<Activity>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(map_err)
    }

    async fn latest_activity_start(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let newest: Vec<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("provider").eq(provider.as_str()),
                ])
            })
            .order_by([("start_date", FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(map_err)?;
        Ok(newest.first().map(|a| a.start_date))
    }

    async fn activities_page(
        &self,
        user_id: u64,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Activity>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| q.field("user_id").eq(user_id))
            .order_by([
                ("start_date", FirestoreQueryDirection::Descending),
                ("provider_activity_id", FirestoreQueryDirection::Descending),
            ])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(map_err)
    }

    // ─── Point Total Operations ──────────────────────────────────

    async fn get_user_points(&self, user_id: u64) -> Result<Option<UserPoints>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_POINTS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(map_err)
    }

    async fn set_user_points(&self, points: &UserPoints) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USER_POINTS)
            .document_id(points.user_id.to_string())
            .object(points)
            .execute()
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
