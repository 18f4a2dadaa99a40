// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod kms;
pub mod ledger;
pub mod merge;
pub mod points;
pub mod provider;
pub mod rates;
pub mod strava;
pub mod sync;

pub use credentials::{CredentialError, CredentialStore};
pub use kms::KmsService;
pub use ledger::LedgerReconciler;
pub use merge::{ActivityMerger, MergeOutcome};
pub use provider::{ActivityPage, ActivityProvider, ProviderActivity};
pub use rates::{CategoryRate, RateRule, RateTable};
pub use strava::StravaClient;
pub use sync::{SyncService, SyncSettings, SyncState};
