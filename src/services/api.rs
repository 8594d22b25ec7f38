// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote inventory API client.
//!
//! Handles:
//! - Profile fetches with the component set the engine needs
//! - Item transfer and equip actions
//! - OAuth token exchange and refresh
//! - Detection of the remote "system disabled" maintenance state

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{AccountIdentity, ProfileResponse, TokenResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Profile components requested on every fetch.
const PROFILE_COMPONENTS: &str =
    "Characters,CharacterInventories,CharacterEquipment,ProfileInventories,ItemInstances";

/// Remote API seam the engine's services depend on.
///
/// Implemented by [`ApiClient`] for the real service; tests substitute an
/// in-memory mock.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Exchange an authorization code for a token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse>;

    /// Redeem a refresh token for a new token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Fetch the full profile snapshot payload.
    async fn get_profile(
        &self,
        access_token: &str,
        identity: &AccountIdentity,
    ) -> Result<ProfileResponse>;

    /// Move an item between a character and the vault.
    async fn transfer_item(&self, access_token: &str, req: &TransferItemRequest) -> Result<()>;

    /// Equip an instanced item on the character that holds it.
    async fn equip_item(&self, access_token: &str, req: &EquipItemRequest) -> Result<()>;
}

/// Transfer action request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemRequest {
    pub item_reference_hash: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub stack_size: u32,
    pub transfer_to_vault: bool,
    pub character_id: String,
    pub membership_type: i32,
}

/// Equip action request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipItemRequest {
    pub item_id: String,
    pub character_id: String,
    pub membership_type: i32,
}

/// Response envelope wrapping every API payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiEnvelope<T> {
    response: Option<T>,
    #[serde(default = "default_error_status")]
    error_status: String,
}

fn default_error_status() -> String {
    "Success".to_string()
}

/// HTTP client for the remote inventory API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    client_id: String,
    client_secret: String,
}

impl ApiClient {
    /// Create a new client from engine configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
        }
    }

    /// POST to the OAuth token endpoint with the given form body.
    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = format!("{}/oauth/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .form(form)
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::RefreshFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::RefreshFailed(format!("token parse error: {}", e)))
    }

    /// Check response status and decode the envelope around `T`.
    ///
    /// The maintenance state is signalled through the envelope's
    /// `ErrorStatus`, on both success and error HTTP codes.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Network(format!("body read error: {}", e)))?;

        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<T>>(&body) {
            match envelope.error_status.as_str() {
                "Success" => {
                    if let Some(payload) = envelope.response {
                        return Ok(payload);
                    }
                }
                "SystemDisabled" => {
                    tracing::warn!("Remote system disabled for maintenance");
                    return Err(EngineError::SystemDisabled);
                }
                other => {
                    return Err(EngineError::Network(format!("API error: {}", other)));
                }
            }
        }

        if status.as_u16() == 429 {
            tracing::warn!("Remote rate limit hit (429)");
            return Err(EngineError::Network("rate limited".to_string()));
        }

        Err(EngineError::Network(format!("HTTP {}: {}", status, body)))
    }

    /// Same as [`check_response_json`] for action endpoints that carry no
    /// payload of interest.
    async fn check_response(&self, response: reqwest::Response) -> Result<()> {
        let _: serde_json::Value = self.check_response_json(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn get_profile(
        &self,
        access_token: &str,
        identity: &AccountIdentity,
    ) -> Result<ProfileResponse> {
        let url = format!(
            "{}/Profile/{}/{}?components={}",
            self.base_url, identity.membership_type, identity.membership_id, PROFILE_COMPONENTS
        );

        let response = self
            .http
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        self.check_response_json(response).await
    }

    async fn transfer_item(&self, access_token: &str, req: &TransferItemRequest) -> Result<()> {
        let url = format!("{}/Actions/Items/TransferItem", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .bearer_auth(access_token)
            .json(req)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        self.check_response(response).await
    }

    async fn equip_item(&self, access_token: &str, req: &EquipItemRequest) -> Result<()> {
        let url = format!("{}/Actions/Items/EquipItem", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .bearer_auth(access_token)
            .json(req)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        self.check_response(response).await
    }
}
