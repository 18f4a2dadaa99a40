// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider credentials, plaintext and encrypted-at-rest forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Provider;

/// Decrypted bearer credential for one (user, provider) pair.
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub user_id: u64,
    pub provider: Provider,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
    /// Provider-side user ID (Strava athlete ID)
    pub provider_user_id: Option<u64>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("provider_user_id", &self.provider_user_id)
            .finish()
    }
}

/// Credential as stored in Firestore (tokens encrypted with KMS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub user_id: u64,
    pub provider: Provider,
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    #[serde(default)]
    pub refresh_token_encrypted: Option<String>,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub provider_user_id: Option<u64>,
    /// Last time the credential was written (ISO 8601)
    pub updated_at: String,
}

impl StoredCredential {
    pub fn document_id_for(user_id: u64, provider: Provider) -> String {
        format!("{}_{}", provider, user_id)
    }
}
