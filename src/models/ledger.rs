// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point ledger records and sync summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Persisted point total for one user.
///
/// Stored at: `user_points/{user_id}`. Always rewritten from the full
/// activity set, never incremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPoints {
    pub user_id: u64,
    pub total_points: u64,
    /// Number of activities that contributed to `total_points`
    pub eligible_activities: u32,
    pub updated_at: DateTime<Utc>,
}

/// Summary of one sync run, rendered by the front end as a flash message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResult {
    pub imported: u32,
    pub updated: u32,
    pub skipped: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub new_total: u64,
    pub pages_fetched: u32,
    /// True when the page ceiling stopped the fetch before the provider ran out.
    pub truncated: bool,
}
