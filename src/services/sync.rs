// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile synchronization controller.
//!
//! Sole writer of the installed snapshot from remote truth. Fetches the
//! remote profile, validates it, arbitrates freshness against the
//! currently installed snapshot, and republishes snapshot + location
//! index as one atomic swap.

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{Item, ItemIdentifier, ProfileSnapshot};
use crate::services::{LocationIndex, RemoteApi, TokenService};
use crate::storage::CacheStore;
use crate::SharedIdentity;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// A snapshot and the index derived from it, always swapped together.
pub struct Installed {
    pub snapshot: Arc<ProfileSnapshot>,
    pub index: LocationIndex,
}

/// What a `refresh` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresher snapshot was installed
    Installed,
    /// Last accepted fetch is recent enough; nothing fetched
    SkippedFresh,
    /// Not signed in; nothing fetched
    SkippedUnauthenticated,
    /// Another fetch is already in flight
    SkippedInFlight,
    /// Fetched fine but not strictly fresher than the installed snapshot
    RejectedStale,
}

pub struct SyncService {
    api: Arc<dyn RemoteApi>,
    tokens: Arc<TokenService>,
    store: CacheStore,
    identity: SharedIdentity,
    staleness: Duration,
    poll_interval: Duration,
    installed: RwLock<Option<Arc<Installed>>>,
    last_accepted: Mutex<Option<Instant>>,
    /// Set while the remote reports SystemDisabled; consulted by the
    /// transfer orchestrator to short-circuit writes.
    system_disabled: AtomicBool,
    /// Set while a fetch is in flight; overlapping polls are skipped.
    fetch_in_flight: AtomicBool,
}

impl SyncService {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        tokens: Arc<TokenService>,
        store: CacheStore,
        identity: SharedIdentity,
        config: &Config,
    ) -> Self {
        Self {
            api,
            tokens,
            store,
            identity,
            staleness: Duration::from_secs(config.staleness_secs.max(0) as u64),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            installed: RwLock::new(None),
            last_accepted: Mutex::new(None),
            system_disabled: AtomicBool::new(false),
            fetch_in_flight: AtomicBool::new(false),
        }
    }

    // ─── Read path ───────────────────────────────────────────────────────────

    /// The currently installed snapshot+index pair, if any.
    pub fn installed(&self) -> Option<Arc<Installed>> {
        self.installed.read().unwrap().clone()
    }

    /// The currently installed snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<ProfileSnapshot>> {
        self.installed().map(|i| i.snapshot.clone())
    }

    /// Look an item up in the current index.
    pub fn find_item(&self, ident: &ItemIdentifier) -> Result<Item> {
        match self.installed() {
            Some(installed) => installed.index.find_item(ident),
            None => Err(EngineError::ItemNotFound(format!(
                "item {} (no profile installed)",
                ident.item_hash
            ))),
        }
    }

    /// Max movable quantity for an item in the current index.
    pub fn max_transferable_quantity(&self, item: &Item) -> u32 {
        match self.installed() {
            Some(installed) => installed.index.max_transferable_quantity(item),
            None => 0,
        }
    }

    /// Whether the remote is currently reporting maintenance.
    pub fn is_system_disabled(&self) -> bool {
        self.system_disabled.load(Ordering::SeqCst)
    }

    // ─── Refresh ─────────────────────────────────────────────────────────────

    /// Fetch and (maybe) install a fresher snapshot.
    ///
    /// No-op when not authenticated. Without `force`, skipped while the
    /// last accepted fetch is younger than the staleness threshold.
    pub async fn refresh(&self, force: bool) -> Result<RefreshOutcome> {
        let identity = match self.identity.read().unwrap().clone() {
            Some(identity) if self.tokens.is_authenticated() => identity,
            _ => return Ok(RefreshOutcome::SkippedUnauthenticated),
        };

        if !force && !self.is_stale() {
            return Ok(RefreshOutcome::SkippedFresh);
        }

        // One fetch at a time; a tick that finds a previous poll still in
        // flight is skipped rather than queued.
        if self.fetch_in_flight.swap(true, Ordering::SeqCst) {
            return Ok(RefreshOutcome::SkippedInFlight);
        }
        let _guard = InFlightGuard(&self.fetch_in_flight);

        let token = self.tokens.get_valid_token("profile refresh").await?;

        let response = match self.api.get_profile(&token.access_token, &identity).await {
            Ok(response) => response,
            Err(EngineError::SystemDisabled) => {
                self.system_disabled.store(true, Ordering::SeqCst);
                return Err(EngineError::SystemDisabled);
            }
            Err(e) => return Err(e),
        };
        self.system_disabled.store(false, Ordering::SeqCst);

        // A structurally invalid response never touches the snapshot.
        let snapshot = match ProfileSnapshot::from_response(response) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Discarding invalid profile response");
                return Err(e);
            }
        };

        if !self.try_install(Arc::new(snapshot)) {
            tracing::debug!("Fetched snapshot not fresher than installed, rejected");
            return Ok(RefreshOutcome::RejectedStale);
        }

        if let Some(installed) = self.snapshot() {
            if let Err(e) = self.store.save_snapshot(&identity.membership_id, &installed) {
                tracing::warn!(error = %e, "Failed to cache snapshot");
            }
        }

        Ok(RefreshOutcome::Installed)
    }

    /// Install a cached snapshot at startup.
    ///
    /// Goes through the same freshness arbitration, so a poll result that
    /// lands first is never clobbered by stale cache.
    pub fn install_cached(&self, snapshot: ProfileSnapshot) -> bool {
        self.try_install(Arc::new(snapshot))
    }

    /// Clear all synchronized state (logout).
    pub fn clear(&self) {
        *self.installed.write().unwrap() = None;
        *self.last_accepted.lock().unwrap() = None;
        self.system_disabled.store(false, Ordering::SeqCst);
        if let Some(identity) = self.identity.read().unwrap().clone() {
            if let Err(e) = self.store.delete_snapshot(&identity.membership_id) {
                tracing::warn!(error = %e, "Failed to delete cached snapshot");
            }
        }
    }

    /// Atomically replace the installed snapshot if strictly fresher.
    fn try_install(&self, snapshot: Arc<ProfileSnapshot>) -> bool {
        let mut slot = self.installed.write().unwrap();
        if let Some(current) = slot.as_ref() {
            if !snapshot.is_fresher_than(&current.snapshot) {
                return false;
            }
        }

        let index = LocationIndex::build(&snapshot);
        tracing::info!(
            items = index.len(),
            minted = %snapshot.response_minted,
            "Installed profile snapshot"
        );
        *slot = Some(Arc::new(Installed { snapshot, index }));
        drop(slot);

        *self.last_accepted.lock().unwrap() = Some(Instant::now());
        true
    }

    fn is_stale(&self) -> bool {
        match *self.last_accepted.lock().unwrap() {
            Some(at) => at.elapsed() > self.staleness,
            None => true,
        }
    }

    // ─── Poll loop ───────────────────────────────────────────────────────────

    /// Run the background poll loop until the task is aborted.
    ///
    /// Ticks every poll interval and re-fetches once the staleness
    /// threshold has elapsed. Transient failures are logged and absorbed;
    /// they never kill the loop.
    pub async fn run_poll_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            match self.refresh(false).await {
                Ok(_) => {}
                Err(EngineError::SystemDisabled) => {
                    tracing::warn!("Remote system disabled, polling continues");
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(error = %e, "Profile poll failed, will retry");
                }
                Err(EngineError::AuthExpired) => {
                    tracing::warn!("Session expired, re-login required");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Profile poll failed");
                }
            }
        }
    }
}

/// Clears the in-flight flag on every exit path out of `refresh`.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
