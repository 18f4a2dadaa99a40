// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod credential;
pub mod ledger;
pub mod provider;
pub mod user;

pub use activity::Activity;
pub use credential::{Credential, StoredCredential};
pub use ledger::{SyncResult, UserPoints};
pub use provider::Provider;
pub use user::User;
