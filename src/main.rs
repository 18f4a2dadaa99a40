// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Golden Runners API Server
//!
//! Imports Strava activities and keeps each user's point total reconciled
//! with their imported history.

use golden_runners::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, Store},
    services::{KmsService, RateTable, StravaClient, SyncService, SyncSettings},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.storage_backend,
        "Starting Golden Runners API"
    );

    // Load point rates
    let rates = match &config.rate_table_path {
        Some(path) => {
            tracing::info!(path = %path, "Loading rate table");
            RateTable::load_from_file(path)?
        }
        None => RateTable::default(),
    };
    tracing::info!(categories = rates.len(), "Rate table loaded");

    // Initialize storage and token encryption
    let (store, kms): (Arc<dyn Store>, KmsService) = match config.storage_backend {
        StorageBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            let kms = KmsService::new(
                &config.gcp_project_id,
                &config.gcp_region,
                &config.kms_key_name,
            )
            .await?;
            tracing::info!("KMS service initialized");
            (Arc::new(db), kms)
        }
        StorageBackend::Memory => local_backend()?,
    };

    // Initialize Strava client
    let strava = StravaClient::with_base_urls(
        &config.strava_api_base_url,
        &config.strava_oauth_base_url,
        Duration::from_secs(config.http_timeout_secs),
    )?;

    let sync_service = SyncService::new(
        store.clone(),
        Arc::new(kms),
        Arc::new(strava),
        Arc::new(rates),
        SyncSettings::from(&config),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        sync_service,
    });

    // Build router
    let app = golden_runners::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// In-memory store with mock KMS, for local runs without GCP.
#[cfg(debug_assertions)]
fn local_backend() -> Result<(Arc<dyn Store>, KmsService), Box<dyn std::error::Error>> {
    tracing::warn!("Using in-memory storage; data is lost on restart");
    Ok((
        Arc::new(golden_runners::db::MemoryDb::new()),
        KmsService::new_mock(),
    ))
}

#[cfg(not(debug_assertions))]
fn local_backend() -> Result<(Arc<dyn Store>, KmsService), Box<dyn std::error::Error>> {
    Err("STORAGE_BACKEND=memory is only available in debug builds".into())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("golden_runners=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
