// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Vault-Courier: inventory synchronization & transfer engine
//!
//! Keeps a local, addressable model of a live-service game inventory in
//! sync with the authoritative remote API, serializes OAuth token
//! refreshes, and executes multi-step item relocations through the vault
//! relay.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

use config::Config;
use error::Result;
use models::item::DefinitionLookup;
use models::{AccountIdentity, ItemIdentifier};
use services::{RemoteApi, SyncService, TokenService, TransferService};
use std::sync::{Arc, RwLock};
use storage::CacheStore;

/// Identity of the signed-in account, shared by every component that
/// builds request URLs. Replaced by single atomic assignment.
pub type SharedIdentity = Arc<RwLock<Option<AccountIdentity>>>;

/// The wired engine: one instance per signed-in session.
pub struct Engine {
    pub config: Config,
    pub store: CacheStore,
    pub identity: SharedIdentity,
    pub tokens: Arc<TokenService>,
    pub sync: Arc<SyncService>,
    pub transfer: Arc<TransferService>,
}

impl Engine {
    /// Wire the engine components around a remote API implementation and
    /// a definition lookup.
    pub fn new(
        config: Config,
        store: CacheStore,
        api: Arc<dyn RemoteApi>,
        definitions: Arc<dyn DefinitionLookup>,
    ) -> Self {
        let identity: SharedIdentity = Arc::new(RwLock::new(None));

        let tokens = Arc::new(TokenService::new(
            api.clone(),
            store.clone(),
            identity.clone(),
        ));
        let sync = Arc::new(SyncService::new(
            api.clone(),
            tokens.clone(),
            store.clone(),
            identity.clone(),
            &config,
        ));
        let transfer = Arc::new(TransferService::new(
            api,
            tokens.clone(),
            sync.clone(),
            definitions,
            identity.clone(),
        ));

        Self {
            config,
            store,
            identity,
            tokens,
            sync,
            transfer,
        }
    }

    /// Complete a login: store the identity, exchange the authorization
    /// code, and pull the first profile snapshot.
    pub async fn sign_in(&self, identity: AccountIdentity, code: &str) -> Result<()> {
        *self.identity.write().unwrap() = Some(identity.clone());
        if let Err(e) = self.store.save_identity(&identity) {
            tracing::warn!(error = %e, "Failed to persist identity");
        }

        self.tokens.login(code).await?;

        // First fetch; a transient failure here is fine, polling retries.
        if let Err(e) = self.sync.refresh(true).await {
            tracing::warn!(error = %e, "Initial profile fetch failed");
        }
        Ok(())
    }

    /// Restore a persisted session. Returns false when nothing usable is
    /// on disk.
    pub async fn restore_session(&self) -> Result<bool> {
        let identity = match self.store.load_identity()? {
            Some(identity) => identity,
            None => return Ok(false),
        };

        let token = match self.store.load_token(&identity.membership_id)? {
            Some(token) => token,
            None => return Ok(false),
        };

        *self.identity.write().unwrap() = Some(identity.clone());
        self.tokens.install(token);

        if let Some(snapshot) = self.store.load_snapshot(&identity.membership_id)? {
            self.sync.install_cached(snapshot);
        }

        tracing::info!(membership_id = %identity.membership_id, "Session restored");
        Ok(true)
    }

    /// Sign out: destroy the token pair, the snapshot, and every
    /// persisted blob.
    pub async fn sign_out(&self) -> Result<()> {
        let membership_id = self
            .identity
            .read()
            .unwrap()
            .as_ref()
            .map(|i| i.membership_id.clone());

        self.tokens.clear();
        self.sync.clear();
        *self.identity.write().unwrap() = None;

        if let Some(id) = membership_id {
            self.store.clear_account(&id)?;
            tracing::info!(membership_id = %id, "Signed out");
        }
        Ok(())
    }

    /// Read access for the surrounding application.
    pub fn find_item(&self, ident: &ItemIdentifier) -> Result<models::Item> {
        self.sync.find_item(ident)
    }
}
