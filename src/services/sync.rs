// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestrator.
//!
//! One run pulls new activities for a user from the provider, merges them
//! page by page, then recomputes the user's point total:
//!
//! ```text
//! NotConnected → Ready → Fetching ⇄ Merging → Reconciling → Done
//!        └─────────┴─────────┴─────────┴───────────┴──→ Failed
//! ```
//!
//! Runs for the same (user, provider) are serialized by a per-key async
//! mutex; runs for different users proceed in parallel.

use crate::config::Config;
use crate::db::Store;
use crate::error::{StoreError, SyncError};
use crate::models::{Credential, Provider, SyncResult};
use crate::services::credentials::{is_live, CredentialError, CredentialStore};
use crate::services::kms::KmsService;
use crate::services::ledger::LedgerReconciler;
use crate::services::merge::{ActivityMerger, MergeOutcome};
use crate::services::provider::ActivityProvider;
use crate::services::rates::RateTable;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared per-(user, provider) run locks.
pub type SyncLocks = Arc<DashMap<(u64, Provider), Arc<Mutex<()>>>>;

/// Provider `after` filters are exclusive and whole-second, so the stored
/// watermark is pulled back this far to refetch same-second activities.
const WATERMARK_OVERLAP_SECS: i64 = 1;

/// Held run lock for one key. On drop, releases the mutex and removes the
/// map entry if nobody else holds or waits on it.
struct RunLock {
    guard: Option<OwnedMutexGuard<()>>,
    locks: SyncLocks,
    key: (u64, Provider),
}

impl RunLock {
    async fn acquire(locks: &SyncLocks, key: (u64, Provider)) -> Self {
        let mutex = locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        Self {
            guard: Some(guard),
            locks: locks.clone(),
            key,
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Tunables for a sync run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub page_size: u32,
    /// Soft ceiling on pages fetched per run.
    pub max_pages: u32,
    pub credential_skew: Duration,
    /// How far back a first sync looks when nothing else bounds it.
    pub lookback: Duration,
    /// Subtracted from the registration instant for the first-sync watermark.
    pub registration_grace: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 30,
            max_pages: 5,
            credential_skew: Duration::seconds(60),
            lookback: Duration::days(90),
            registration_grace: Duration::seconds(3600),
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.sync_page_size,
            max_pages: config.sync_max_pages,
            credential_skew: Duration::seconds(config.credential_skew_secs),
            lookback: Duration::days(config.sync_lookback_days),
            registration_grace: Duration::seconds(config.registration_grace_secs),
        }
    }
}

/// Lifecycle of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    NotConnected,
    Ready,
    Fetching,
    Merging,
    Reconciling,
    Done,
    Failed,
}

impl SyncState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncState::Done | SyncState::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: SyncState) -> bool {
        use SyncState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (NotConnected, Ready)
            | (Ready, Fetching)
            | (Fetching, Merging)
            | (Merging, Fetching)
            | (Merging, Reconciling)
            | (Reconciling, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::NotConnected => "not_connected",
            SyncState::Ready => "ready",
            SyncState::Fetching => "fetching",
            SyncState::Merging => "merging",
            SyncState::Reconciling => "reconciling",
            SyncState::Done => "done",
            SyncState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Bookkeeping for one in-flight run.
struct SyncRun {
    user_id: u64,
    state: SyncState,
    result: SyncResult,
    /// True once any activity write succeeded.
    committed: bool,
}

impl SyncRun {
    fn new(user_id: u64) -> Self {
        Self {
            user_id,
            state: SyncState::NotConnected,
            result: SyncResult::default(),
            committed: false,
        }
    }

    fn advance(&mut self, next: SyncState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal sync transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(user_id = self.user_id, from = %self.state, to = %next, "Sync state");
        self.state = next;
    }

    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => {
                self.result.imported += 1;
                self.committed = true;
            }
            MergeOutcome::UpdatedForPoints => {
                self.result.updated += 1;
                self.committed = true;
            }
            MergeOutcome::Skipped => self.result.skipped += 1,
        }
    }
}

/// Lower bound (exclusive) on activity start for the next fetch.
///
/// Latest stored start for this provider, less a one-second overlap, if any;
/// otherwise the registration instant minus the grace window; otherwise
/// `now - lookback`. Refetched activities are deduplicated by merge.
pub fn compute_watermark(
    latest_start: Option<DateTime<Utc>>,
    registered_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    settings: &SyncSettings,
) -> DateTime<Utc> {
    latest_start
        .map(|latest| latest - Duration::seconds(WATERMARK_OVERLAP_SECS))
        .or_else(|| registered_at.map(|r| r - settings.registration_grace))
        .unwrap_or_else(|| now - settings.lookback)
}

/// Sync orchestrator.
#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn Store>,
    credentials: CredentialStore,
    provider: Arc<dyn ActivityProvider>,
    merger: ActivityMerger,
    ledger: LedgerReconciler,
    settings: SyncSettings,
    locks: SyncLocks,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn Store>,
        kms: Arc<KmsService>,
        provider: Arc<dyn ActivityProvider>,
        rates: Arc<RateTable>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(store.clone(), kms),
            merger: ActivityMerger::new(store.clone(), rates),
            ledger: LedgerReconciler::new(store.clone()),
            store,
            provider,
            settings,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn ledger(&self) -> &LedgerReconciler {
        &self.ledger
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    async fn lock(&self, user_id: u64) -> RunLock {
        RunLock::acquire(&self.locks, (user_id, self.provider.provider())).await
    }

    /// Number of users with a run lock currently held or awaited.
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    /// Run a sync for `user_id` now.
    pub async fn sync(&self, user_id: u64) -> Result<SyncResult, SyncError> {
        self.sync_at(user_id, Utc::now()).await
    }

    /// Run a sync with an explicit clock.
    pub async fn sync_at(&self, user_id: u64, now: DateTime<Utc>) -> Result<SyncResult, SyncError> {
        let provider = self.provider.provider();
        let _lock = self.lock(user_id).await;

        tracing::info!(user_id, provider = %provider, "Starting sync");
        let mut run = SyncRun::new(user_id);

        match self.execute(&mut run, provider, now).await {
            Ok(()) => {
                let result = run.result;
                tracing::info!(
                    user_id,
                    provider = %provider,
                    imported = result.imported,
                    updated = result.updated,
                    skipped = result.skipped,
                    pages_fetched = result.pages_fetched,
                    truncated = result.truncated,
                    new_total = result.new_total,
                    "Sync complete"
                );
                Ok(result)
            }
            Err(err) => {
                let failed_in = run.state;
                run.advance(SyncState::Failed);

                // Keep the stored total in step with whatever was committed.
                if run.committed && failed_in != SyncState::Reconciling {
                    if let Err(e) = self.ledger.reconcile(user_id, now).await {
                        tracing::warn!(user_id, error = %e, "Best-effort reconcile failed");
                    }
                }

                match &err {
                    SyncError::NeedsReauth => {
                        tracing::warn!(user_id, provider = %provider, state = %failed_in, "Sync needs re-authorization")
                    }
                    _ => {
                        tracing::error!(user_id, provider = %provider, state = %failed_in, error = %err, "Sync failed")
                    }
                }
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        run: &mut SyncRun,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let user_id = run.user_id;

        // ─── NotConnected → Ready ────────────────────────────────────
        let credential = self.live_credential(user_id, provider, now).await?;
        run.advance(SyncState::Ready);

        let registered_at = self
            .store
            .get_user(user_id)
            .await?
            .and_then(|u| u.registered_at);
        let latest_start = self.store.latest_activity_start(user_id, provider).await?;
        let after = compute_watermark(latest_start, registered_at, now, &self.settings);
        tracing::debug!(user_id, after = %after, "Computed sync watermark");

        // ─── Fetching ⇄ Merging ──────────────────────────────────────
        let max_pages = self.settings.max_pages.max(1);
        let mut page = 1;
        loop {
            run.advance(SyncState::Fetching);
            let batch = self
                .provider
                .list_activities(&credential, after, page, self.settings.page_size)
                .await?;
            run.result.pages_fetched += 1;

            run.advance(SyncState::Merging);
            tracing::debug!(user_id, page, items = batch.items.len(), "Merging page");
            for item in &batch.items {
                let outcome = self
                    .merger
                    .merge(user_id, provider, registered_at, item, now)
                    .await?;
                run.record(outcome);
            }

            if batch.is_last || batch.items.is_empty() {
                break;
            }
            if page >= max_pages {
                run.result.truncated = true;
                tracing::warn!(user_id, pages = page, "Page ceiling reached, stopping early");
                break;
            }
            page += 1;
        }

        // ─── Reconciling → Done ──────────────────────────────────────
        run.advance(SyncState::Reconciling);
        run.result.new_total = self.ledger.reconcile(user_id, now).await?;
        run.advance(SyncState::Done);
        Ok(())
    }

    /// Load the credential and check it is usable. Anything short of a live
    /// credential, other than a storage outage, means the user must reconnect.
    async fn live_credential(
        &self,
        user_id: u64,
        provider: Provider,
        now: DateTime<Utc>,
    ) -> Result<Credential, SyncError> {
        let credential = match self.credentials.get(user_id, provider).await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                tracing::info!(user_id, provider = %provider, "No provider connection");
                return Err(SyncError::NeedsReauth);
            }
            Err(CredentialError::Storage(e)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Stored credential unusable");
                return Err(SyncError::NeedsReauth);
            }
        };

        if !is_live(&credential, now, self.settings.credential_skew) {
            tracing::info!(
                user_id,
                expires_at = %credential.expires_at,
                "Provider credential expired"
            );
            return Err(SyncError::NeedsReauth);
        }
        Ok(credential)
    }

    /// Store (or replace) the user's provider credential.
    pub async fn connect(&self, credential: &Credential) -> Result<(), CredentialError> {
        let _lock = self.lock(credential.user_id).await;
        self.credentials.upsert(credential).await
    }

    /// Remove the user's provider connection.
    ///
    /// Waits for any in-flight sync, deletes the stored credential, then asks
    /// the provider to deauthorize the old token. A deauthorization failure is
    /// logged and otherwise ignored. Activities and the point total are kept.
    pub async fn disconnect(&self, user_id: u64) -> Result<bool, StoreError> {
        let provider = self.provider.provider();
        let _lock = self.lock(user_id).await;

        let credential = match self.credentials.get(user_id, provider).await {
            Ok(credential) => credential,
            Err(CredentialError::Storage(e)) => return Err(e),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Cannot read credential for deauthorization");
                None
            }
        };

        let existed = match self.credentials.revoke(user_id, provider).await {
            Ok(existed) => existed,
            Err(CredentialError::Storage(e)) => return Err(e),
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };

        if let Some(credential) = credential {
            if let Err(e) = self.provider.deauthorize(&credential).await {
                tracing::warn!(user_id, error = %e, "Provider deauthorization failed");
            }
        }
        Ok(existed)
    }
}
