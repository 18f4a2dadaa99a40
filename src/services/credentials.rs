// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store: provider tokens encrypted at rest with KMS.
//!
//! Tokens are bound to their owner via `user_id` AAD, so a ciphertext moved
//! onto another user's document fails to decrypt.

use crate::db::Store;
use crate::error::StoreError;
use crate::models::{Credential, Provider, StoredCredential};
use crate::services::kms::{token_aad, KmsError, KmsService};
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Token encryption failed: {0}")]
    Encryption(#[from] KmsError),

    #[error("Stored credential is corrupt: {0}")]
    Corrupt(String),
}

/// A credential is live iff it expires strictly after `now + skew`.
pub fn is_live(credential: &Credential, now: DateTime<Utc>, skew: Duration) -> bool {
    credential.expires_at > now + skew
}

#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn Store>,
    kms: Arc<KmsService>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn Store>, kms: Arc<KmsService>) -> Self {
        Self { store, kms }
    }

    /// Load and decrypt. `Ok(None)` means the user is not connected.
    pub async fn get(
        &self,
        user_id: u64,
        provider: Provider,
    ) -> Result<Option<Credential>, CredentialError> {
        let Some(stored) = self.store.get_credential(user_id, provider).await? else {
            return Ok(None);
        };

        if stored.user_id != user_id || stored.provider != provider {
            return Err(CredentialError::Corrupt(format!(
                "document for {}_{} belongs to {}_{}",
                provider, user_id, stored.provider, stored.user_id
            )));
        }

        let aad = token_aad(user_id);
        let access_token = self
            .kms
            .decrypt(&stored.access_token_encrypted, Some(&aad))
            .await?;
        let refresh_token = match &stored.refresh_token_encrypted {
            Some(encrypted) => Some(self.kms.decrypt(encrypted, Some(&aad)).await?),
            None => None,
        };
        let expires_at = parse_utc_rfc3339(&stored.expires_at).ok_or_else(|| {
            CredentialError::Corrupt(format!("invalid expires_at {:?}", stored.expires_at))
        })?;

        Ok(Some(Credential {
            user_id,
            provider,
            access_token,
            refresh_token,
            expires_at,
            scopes: stored.scopes,
            provider_user_id: stored.provider_user_id,
        }))
    }

    /// Encrypt and create-or-replace the credential for its (user, provider).
    pub async fn upsert(&self, credential: &Credential) -> Result<(), CredentialError> {
        let aad = token_aad(credential.user_id);
        let access_token_encrypted = self
            .kms
            .encrypt(&credential.access_token, Some(&aad))
            .await?;
        let refresh_token_encrypted = match &credential.refresh_token {
            Some(token) => Some(self.kms.encrypt(token, Some(&aad)).await?),
            None => None,
        };

        let stored = StoredCredential {
            user_id: credential.user_id,
            provider: credential.provider,
            access_token_encrypted,
            refresh_token_encrypted,
            expires_at: format_utc_rfc3339(credential.expires_at),
            scopes: credential.scopes.clone(),
            provider_user_id: credential.provider_user_id,
            updated_at: format_utc_rfc3339(Utc::now()),
        };

        self.store.set_credential(&stored).await?;
        tracing::info!(
            user_id = credential.user_id,
            provider = %credential.provider,
            "Stored provider credential"
        );
        Ok(())
    }

    /// Delete the credential. Returns `true` if one existed.
    pub async fn revoke(&self, user_id: u64, provider: Provider) -> Result<bool, CredentialError> {
        let existed = self.store.delete_credential(user_id, provider).await?;
        tracing::info!(user_id, provider = %provider, existed, "Revoked provider credential");
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use chrono::TimeZone;

    fn credential(user_id: u64) -> Credential {
        Credential {
            user_id,
            provider: Provider::Strava,
            access_token: "access-abc".to_string(),
            refresh_token: Some("refresh-xyz".to_string()),
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            scopes: vec!["activity:read_all".to_string()],
            provider_user_id: Some(987),
        }
    }

    fn store_with(db: &MemoryDb) -> CredentialStore {
        CredentialStore::new(Arc::new(db.clone()), Arc::new(KmsService::new_mock()))
    }

    #[test]
    fn test_is_live_respects_skew() {
        let cred = credential(1);
        let expires = cred.expires_at;
        let skew = Duration::seconds(60);

        assert!(is_live(&cred, expires - Duration::seconds(61), skew));
        assert!(!is_live(&cred, expires - Duration::seconds(60), skew));
        assert!(!is_live(&cred, expires, skew));
    }

    #[tokio::test]
    async fn test_upsert_then_get_round_trips() {
        let db = MemoryDb::new();
        let creds = store_with(&db);

        creds.upsert(&credential(7)).await.unwrap();
        let loaded = creds.get(7, Provider::Strava).await.unwrap().unwrap();
        assert_eq!(loaded, credential(7));

        // Tokens are not stored in the clear.
        let stored = db.get_credential(7, Provider::Strava).await.unwrap().unwrap();
        assert_ne!(stored.access_token_encrypted, "access-abc");
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let db = MemoryDb::new();
        let creds = store_with(&db);

        creds.upsert(&credential(7)).await.unwrap();
        let mut newer = credential(7);
        newer.access_token = "access-2".to_string();
        newer.refresh_token = None;
        creds.upsert(&newer).await.unwrap();

        let loaded = creds.get(7, Provider::Strava).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "access-2");
        assert_eq!(loaded.refresh_token, None);
    }

    #[tokio::test]
    async fn test_missing_credential_is_none() {
        let creds = store_with(&MemoryDb::new());
        assert!(creds.get(1, Provider::Strava).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke() {
        let db = MemoryDb::new();
        let creds = store_with(&db);
        creds.upsert(&credential(3)).await.unwrap();

        assert!(creds.revoke(3, Provider::Strava).await.unwrap());
        assert!(!creds.revoke(3, Provider::Strava).await.unwrap());
        assert!(creds.get(3, Provider::Strava).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ciphertext_moved_to_other_user_fails() {
        let db = MemoryDb::new();
        let creds = store_with(&db);
        creds.upsert(&credential(1)).await.unwrap();

        let mut stolen = db.get_credential(1, Provider::Strava).await.unwrap().unwrap();
        stolen.user_id = 2;
        db.set_credential(&stolen).await.unwrap();

        let result = creds.get(2, Provider::Strava).await;
        assert!(matches!(
            result,
            Err(CredentialError::Encryption(KmsError::AadMismatch))
        ));
    }
}
