// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting provider tokens.
//!
//! Uses direct KMS encryption (not envelope encryption). Every call binds the
//! ciphertext to its owner through additional authenticated data, so a token
//! copied onto another user's document fails to decrypt.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS failures.
#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    #[error("KMS client not connected")]
    NotConnected,

    #[error("KMS request failed: {0}")]
    Request(String),

    #[error("Ciphertext could not be decoded: {0}")]
    Decode(String),

    #[error("Additional authenticated data mismatch")]
    AadMismatch,
}

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "golden-runners";

    /// Create a new KMS service.
    /// Connects to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, KmsError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| KmsError::Request(format!("Failed to create KMS auth config: {}", e)))?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| KmsError::Request(format!("Failed to create KMS client: {}", e)))?;

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for testing (offline mode).
    /// Only available in debug/test builds.
    ///
    /// Ciphertext is `AAD:<b64 aad>:<b64 plaintext>` or `NOAAD:<b64 plaintext>`.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    /// Encrypt plaintext data using KMS.
    /// Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: Option<&[u8]>) -> Result<String, KmsError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Ok(match aad {
                    Some(aad) => format!("AAD:{}:{}", BASE64.encode(aad), BASE64.encode(plaintext)),
                    None => format!("NOAAD:{}", BASE64.encode(plaintext)),
                });
            }
        }

        // In release builds this refuses to run without a real client.
        let client = self.client.as_ref().ok_or(KmsError::NotConnected)?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.map(<[u8]>::to_vec).unwrap_or_default(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| KmsError::Request(format!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt ciphertext using KMS.
    /// Expects base64-encoded ciphertext.
    pub async fn decrypt(&self, ciphertext_b64: &str, aad: Option<&[u8]>) -> Result<String, KmsError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return mock_decrypt(ciphertext_b64, aad);
            }
        }

        let client = self.client.as_ref().ok_or(KmsError::NotConnected)?;

        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|e| KmsError::Decode(e.to_string()))?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.map(<[u8]>::to_vec).unwrap_or_default(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| KmsError::Request(format!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext).map_err(|e| KmsError::Decode(e.to_string()))
    }
}

#[cfg(debug_assertions)]
fn mock_decrypt(ciphertext: &str, aad: Option<&[u8]>) -> Result<String, KmsError> {
    let decode = |part: &str| {
        BASE64
            .decode(part)
            .map_err(|e| KmsError::Decode(format!("{} (mock)", e)))
    };

    let plaintext = if let Some(rest) = ciphertext.strip_prefix("AAD:") {
        let (aad_part, body) = rest
            .split_once(':')
            .ok_or_else(|| KmsError::Decode("missing separator (mock)".to_string()))?;
        if aad != Some(decode(aad_part)?.as_slice()) {
            return Err(KmsError::AadMismatch);
        }
        decode(body)?
    } else if let Some(body) = ciphertext.strip_prefix("NOAAD:") {
        if aad.is_some() {
            return Err(KmsError::AadMismatch);
        }
        decode(body)?
    } else {
        return Err(KmsError::Decode("unknown mock ciphertext format".to_string()));
    };

    String::from_utf8(plaintext).map_err(|e| KmsError::Decode(e.to_string()))
}

/// AAD binding a token to its owner.
pub fn token_aad(user_id: u64) -> Vec<u8> {
    format!("user_id:{}", user_id).into_bytes()
}
