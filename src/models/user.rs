// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
///
/// Written by the login layer; the sync engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Application user ID (also used as document ID)
    pub user_id: u64,
    /// Display name
    pub display_name: String,
    /// When the user registered. Activities before this never earn points.
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
}
