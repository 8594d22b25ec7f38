// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token lifecycle manager.
//!
//! Owns the OAuth access/refresh pair and guarantees at most one in-flight
//! refresh request system-wide. Callers that arrive while a refresh is in
//! flight queue on a fair mutex and are all satisfied with the same
//! refreshed token.

use crate::error::{EngineError, Result};
use crate::models::Token;
use crate::services::RemoteApi;
use crate::storage::CacheStore;
use crate::SharedIdentity;
use chrono::Utc;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

/// Manages the OAuth token pair for the signed-in account.
pub struct TokenService {
    api: Arc<dyn RemoteApi>,
    store: CacheStore,
    identity: SharedIdentity,
    /// Current token pair; replaced by single atomic assignment, never
    /// mutated in place.
    current: RwLock<Option<Token>>,
    /// Serializes refreshes. tokio's mutex wakes waiters in FIFO order,
    /// which gives queued callers the single-flight drain semantics.
    refresh_lock: Mutex<()>,
}

impl TokenService {
    pub fn new(api: Arc<dyn RemoteApi>, store: CacheStore, identity: SharedIdentity) -> Self {
        Self {
            api,
            store,
            identity,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Install a token pair (login or session restore).
    pub fn install(&self, token: Token) {
        *self.current.write().unwrap() = Some(token);
    }

    /// The current token pair, if any.
    pub fn current(&self) -> Option<Token> {
        self.current.read().unwrap().clone()
    }

    /// Whether a token pair is present at all.
    pub fn is_authenticated(&self) -> bool {
        self.current.read().unwrap().is_some()
    }

    /// Drop the token pair and its persisted blob (logout).
    pub fn clear(&self) {
        *self.current.write().unwrap() = None;
        if let Some(identity) = self.identity.read().unwrap().clone() {
            if let Err(e) = self.store.delete_token(&identity.membership_id) {
                tracing::warn!(error = %e, "Failed to delete persisted token");
            }
        }
    }

    /// Exchange an authorization code and install the resulting pair.
    ///
    /// The identity must already be set so the token can be persisted
    /// under the right membership id.
    pub async fn login(&self, code: &str) -> Result<Token> {
        let resp = self.api.exchange_code(code).await?;
        let token = Token::from_response(&resp, Utc::now());
        self.persist(&token);
        self.install(token.clone());
        tracing::info!(membership_id = %resp.membership_id, "Signed in, token stored");
        Ok(token)
    }

    /// Get a valid (non-expired) access token pair.
    ///
    /// Single-flight refresh:
    /// 1. Fast path - current token still valid under the skew margin
    /// 2. Queue on the refresh lock (FIFO); while one caller refreshes,
    ///    the rest wait here
    /// 3. Re-check validity after the lock - a queued caller that finds
    ///    the token another caller refreshed does not refresh again
    /// 4. Refresh, persist the new pair, then publish it
    ///
    /// Fails with `AuthExpired` when the refresh token itself is dead
    /// (caller must force re-login); `RefreshFailed` on any other error.
    pub async fn get_valid_token(&self, reason: &str) -> Result<Token> {
        let now = Utc::now();
        match self.current() {
            Some(token) if token.access_usable(now) => return Ok(token),
            Some(_) => {}
            None => return Err(EngineError::AuthExpired),
        }

        let _guard = self.refresh_lock.lock().await;

        // Re-check after acquiring the lock: the caller ahead of us in the
        // queue may have already refreshed.
        let now = Utc::now();
        let token = match self.current() {
            Some(token) if token.access_usable(now) => return Ok(token),
            Some(token) => token,
            None => return Err(EngineError::AuthExpired),
        };

        if !token.refresh_usable(now) {
            tracing::warn!(reason, "Refresh token expired, forcing re-login");
            return Err(EngineError::AuthExpired);
        }

        tracing::info!(reason, "Access token expired, refreshing");
        let resp = match self.api.refresh_token(&token.refresh_token).await {
            Ok(resp) => resp,
            // The remote rejecting the grant means the pair is dead no
            // matter what our clock says.
            Err(EngineError::RefreshFailed(msg)) if msg.contains("invalid_grant") => {
                return Err(EngineError::AuthExpired);
            }
            Err(EngineError::Network(msg)) => return Err(EngineError::RefreshFailed(msg)),
            Err(e) => return Err(e),
        };

        let new_token = Token::from_response(&resp, Utc::now());

        // Persist before publishing, so a crash between refresh and
        // persistence cannot silently lose a valid token.
        self.persist(&new_token);
        self.install(new_token.clone());

        tracing::info!(reason, "Token refreshed and stored");
        Ok(new_token)
    }

    fn persist(&self, token: &Token) {
        let membership_id = match self.identity.read().unwrap().as_ref() {
            Some(identity) => identity.membership_id.clone(),
            None => {
                tracing::warn!("No identity set, skipping token persistence");
                return;
            }
        };
        if let Err(e) = self.store.save_token(&membership_id, token) {
            tracing::warn!(error = %e, "Failed to persist token");
        }
    }
}
