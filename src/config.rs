// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything comes from the process environment (or `.env` locally).

use std::env;
use std::str::FromStr;

/// Where durable state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    /// In-process maps; data is lost on restart. Debug builds only.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StorageBackend::Firestore),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (KMS key location)
    pub gcp_region: String,
    /// KMS key used for provider tokens
    pub kms_key_name: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub strava_api_base_url: String,
    pub strava_oauth_base_url: String,
    /// Optional JSON rate table; built-in table when unset
    pub rate_table_path: Option<String>,

    // --- Sync tuning ---
    pub sync_page_size: u32,
    pub sync_max_pages: u32,
    pub credential_skew_secs: i64,
    pub sync_lookback_days: i64,
    pub registration_grace_secs: i64,
    pub http_timeout_secs: u64,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-west1".to_string(),
            kms_key_name: "token-encryption".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            strava_api_base_url: crate::services::strava::DEFAULT_API_BASE_URL.to_string(),
            strava_oauth_base_url: crate::services::strava::DEFAULT_OAUTH_BASE_URL.to_string(),
            rate_table_path: None,
            sync_page_size: 30,
            sync_max_pages: 5,
            credential_skew_secs: 60,
            sync_lookback_days: 90,
            registration_grace_secs: 3600,
            http_timeout_secs: 15,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let config = Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-west1".to_string()),
            kms_key_name: env::var("KMS_KEY_NAME")
                .unwrap_or_else(|_| "token-encryption".to_string()),
            port: parse_var("PORT", 8080)?,
            storage_backend: parse_var("STORAGE_BACKEND", StorageBackend::Firestore)?,
            strava_api_base_url: env::var("STRAVA_API_BASE_URL").unwrap_or_else(|_| {
                crate::services::strava::DEFAULT_API_BASE_URL.to_string()
            }),
            strava_oauth_base_url: env::var("STRAVA_OAUTH_BASE_URL").unwrap_or_else(|_| {
                crate::services::strava::DEFAULT_OAUTH_BASE_URL.to_string()
            }),
            rate_table_path: env::var("RATE_TABLE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),

            sync_page_size: parse_var("SYNC_PAGE_SIZE", 30)?,
            sync_max_pages: parse_var("SYNC_MAX_PAGES", 5)?,
            credential_skew_secs: parse_var("CREDENTIAL_SKEW_SECS", 60)?,
            sync_lookback_days: parse_var("SYNC_LOOKBACK_DAYS", 90)?,
            registration_grace_secs: parse_var("REGISTRATION_GRACE_SECS", 3600)?,
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", 15)?,

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the sync engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=200).contains(&self.sync_page_size) {
            return Err(ConfigError::Invalid(
                "SYNC_PAGE_SIZE",
                self.sync_page_size.to_string(),
            ));
        }
        if self.sync_max_pages == 0 {
            return Err(ConfigError::Invalid("SYNC_MAX_PAGES", "0".to_string()));
        }
        if !(0..=MAX_CREDENTIAL_SKEW_SECS).contains(&self.credential_skew_secs) {
            return Err(ConfigError::Invalid(
                "CREDENTIAL_SKEW_SECS",
                self.credential_skew_secs.to_string(),
            ));
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.sync_lookback_days) {
            return Err(ConfigError::Invalid(
                "SYNC_LOOKBACK_DAYS",
                self.sync_lookback_days.to_string(),
            ));
        }
        if !(0..=MAX_REGISTRATION_GRACE_SECS).contains(&self.registration_grace_secs) {
            return Err(ConfigError::Invalid(
                "REGISTRATION_GRACE_SECS",
                self.registration_grace_secs.to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("HTTP_TIMEOUT_SECS", "0".to_string()));
        }
        if self.jwt_signing_key.is_empty() {
            return Err(ConfigError::Missing("JWT_SIGNING_KEY"));
        }
        Ok(())
    }
}

/// Upper bound for `CREDENTIAL_SKEW_SECS` (one day).
const MAX_CREDENTIAL_SKEW_SECS: i64 = 86_400;
/// Upper bound for `SYNC_LOOKBACK_DAYS` (ten years).
const MAX_LOOKBACK_DAYS: i64 = 3_650;
/// Upper bound for `REGISTRATION_GRACE_SECS` (one week).
const MAX_REGISTRATION_GRACE_SECS: i64 = 7 * 86_400;

/// Read an optional env var, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("STORAGE_BACKEND", "Memory");
        env::set_var("SYNC_MAX_PAGES", "3");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.jwt_signing_key, b"test_jwt_key_32_bytes_minimum!!");
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.sync_max_pages, 3);
        assert_eq!(config.sync_page_size, 30);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_ceiling() {
        let config = Config {
            sync_max_pages: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid("SYNC_MAX_PAGES", _))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_durations() {
        let cases = [
            (
                Config {
                    sync_lookback_days: i64::MAX,
                    ..Config::default()
                },
                "SYNC_LOOKBACK_DAYS",
            ),
            (
                Config {
                    credential_skew_secs: i64::MAX,
                    ..Config::default()
                },
                "CREDENTIAL_SKEW_SECS",
            ),
            (
                Config {
                    registration_grace_secs: MAX_REGISTRATION_GRACE_SECS + 1,
                    ..Config::default()
                },
                "REGISTRATION_GRACE_SECS",
            ),
            (
                Config {
                    credential_skew_secs: -1,
                    ..Config::default()
                },
                "CREDENTIAL_SKEW_SECS",
            ),
        ];

        for (config, name) in cases {
            match config.validate() {
                Err(ConfigError::Invalid(field, _)) => assert_eq!(field, name),
                other => panic!("expected {} to be rejected, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_max_bounds_convert_to_durations() {
        let config = Config {
            sync_lookback_days: MAX_LOOKBACK_DAYS,
            credential_skew_secs: MAX_CREDENTIAL_SKEW_SECS,
            registration_grace_secs: MAX_REGISTRATION_GRACE_SECS,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let settings = crate::services::SyncSettings::from(&config);
        assert_eq!(settings.lookback, chrono::Duration::days(MAX_LOOKBACK_DAYS));
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(
            "firestore".parse::<StorageBackend>().unwrap(),
            StorageBackend::Firestore
        );
        assert!("postgres".parse::<StorageBackend>().is_err());
    }
}
