// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vault-Courier sync daemon
//!
//! Headless wiring of the inventory engine: restores the persisted
//! session and keeps the local snapshot in sync with the remote API
//! until interrupted.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vault_courier::{
    config::Config,
    services::{ApiClient, StaticDefinitions},
    storage::CacheStore,
    Engine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(api = %config.api_base_url, "Starting Vault-Courier sync daemon");

    let store = CacheStore::open().expect("Failed to open local cache");

    let api = Arc::new(ApiClient::new(&config));

    // Pre-decoded definition table; transfers fail item lookup without it.
    let definitions = match std::env::var("DEFINITIONS_PATH") {
        Ok(path) => Arc::new(StaticDefinitions::from_json_file(&path)?),
        Err(_) => {
            tracing::warn!("DEFINITIONS_PATH not set, running with empty definitions");
            Arc::new(StaticDefinitions::default())
        }
    };

    let engine = Engine::new(config.clone(), store, api, definitions);

    if !engine.restore_session().await? {
        tracing::error!("No persisted session; sign in first");
        eprintln!(
            "No session found. Authorize via:\n  {}",
            config.authorize_url("https://localhost/callback", "sync-daemon")
        );
        std::process::exit(1);
    }

    let poll = tokio::spawn(engine.sync.clone().run_poll_loop());
    tracing::info!("Sync loop running, Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    poll.abort();
    tracing::info!("Shutting down");
    Ok(())
}

/// Initialize structured logging with env-filter overrides.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vault_courier=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
