// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Golden Runners: points for running (and riding, and swimming).
//!
//! This crate provides the backend API that imports a user's Strava
//! activities, awards points under a configurable rate table and keeps a
//! per-user point total reconciled with the imported history.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::SyncService;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub sync_service: SyncService,
}
