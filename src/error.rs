// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine error taxonomy.
//!
//! Infrastructure-transient errors (network, refresh) are absorbed at the
//! component boundary and surfaced as soft failures; caller-contract
//! violations (bad quantity, item not found) propagate to the immediate
//! caller; `AuthExpired` forces re-login.

use crate::services::transfer::TransferStep;

/// Engine error type shared by all components.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Refresh token expired, re-authentication required")]
    AuthExpired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("The remote system is disabled for maintenance")]
    SystemDisabled,

    #[error("Invalid remote payload: {0}")]
    Validation(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Item is not transferrable")]
    NotTransferrable,

    #[error("Invalid quantity {requested} (must be between 1 and {max})")]
    InvalidQuantity { requested: u32, max: u32 },

    #[error("Transfer failed during {step}: {reason}")]
    TransferFailed { step: TransferStep, reason: String },

    #[error("Item definitions unavailable after {attempts} attempts")]
    DefinitionsUnavailable { attempts: u32 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Transient failures that the next poll or retry may clear.
    ///
    /// These are logged and surfaced as soft notifications; they never
    /// crash the poll loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Network(_) | EngineError::RefreshFailed(_) | EngineError::Storage(_)
        )
    }

    /// True when the only recovery is forcing the login flow.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, EngineError::AuthExpired)
    }
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
