// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transfer orchestrator.
//!
//! Computes the minimal legal sequence of remote calls for an item
//! relocation and executes it sequentially. Character-to-character moves
//! are not supported by the remote system; the vault is the only
//! universal relay, so a move is at most two hops plus an optional
//! trailing equip. There is no optimistic local mutation: every attempt
//! ends in a forced profile refresh that reconciles local state with
//! remote truth.

use crate::error::{EngineError, Result};
use crate::models::item::DefinitionLookup;
use crate::models::{AccountIdentity, CharacterId, Item, ItemIdentifier};
use crate::services::api::{EquipItemRequest, TransferItemRequest};
use crate::services::{RemoteApi, SyncService, TokenService};
use crate::SharedIdentity;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which remote call in the sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStep {
    MoveToVault,
    MoveFromVault,
    Equip,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStep::MoveToVault => write!(f, "move to vault"),
            TransferStep::MoveFromVault => write!(f, "move from vault"),
            TransferStep::Equip => write!(f, "equip"),
        }
    }
}

/// One planned remote call.
#[derive(Debug, Clone)]
enum PlannedCall {
    ToVault { character_id: String },
    FromVault { character_id: String },
    Equip { character_id: String, instance_id: String },
}

impl PlannedCall {
    fn step(&self) -> TransferStep {
        match self {
            PlannedCall::ToVault { .. } => TransferStep::MoveToVault,
            PlannedCall::FromVault { .. } => TransferStep::MoveFromVault,
            PlannedCall::Equip { .. } => TransferStep::Equip,
        }
    }
}

pub struct TransferService {
    api: Arc<dyn RemoteApi>,
    tokens: Arc<TokenService>,
    sync: Arc<SyncService>,
    definitions: Arc<dyn DefinitionLookup>,
    identity: SharedIdentity,
    /// Serializes transfers touching the same item pool, closing the
    /// lost-update window on `max_transferable_quantity` between planning
    /// and execution.
    pool_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TransferService {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        tokens: Arc<TokenService>,
        sync: Arc<SyncService>,
        definitions: Arc<dyn DefinitionLookup>,
        identity: SharedIdentity,
    ) -> Self {
        Self {
            api,
            tokens,
            sync,
            definitions,
            identity,
            pool_locks: DashMap::new(),
        }
    }

    /// Move `quantity` of `item` to `target`, optionally equipping it
    /// there.
    ///
    /// Preconditions surface as hard errors with zero remote calls:
    /// `NotTransferrable` for locked items with a different destination,
    /// `InvalidQuantity` for out-of-range quantities (never silently
    /// clamped). An item already at its target with no equip requested is
    /// an idempotent success.
    pub async fn transfer(
        &self,
        target: &CharacterId,
        item: &Item,
        quantity: u32,
        equip_on_target: bool,
    ) -> Result<()> {
        if self.sync.is_system_disabled() {
            return Err(EngineError::SystemDisabled);
        }

        let identity = self
            .identity
            .read()
            .unwrap()
            .clone()
            .ok_or(EngineError::AuthExpired)?;

        // One transfer at a time per pool: per instance for instanced
        // items, per hash for stackables.
        let pool_key = match &item.instance_id {
            Some(id) => format!("i:{}", id),
            None => format!("h:{}", item.item_hash),
        };
        let lock = self
            .pool_locks
            .entry(pool_key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Resolve against the current index; the caller's copy may have
        // drifted since it was read.
        let current = self.sync.find_item(&ItemIdentifier::of(item))?;

        let def = self.definitions.lookup(current.item_hash).ok_or_else(|| {
            EngineError::ItemNotFound(format!("definition for hash {}", current.item_hash))
        })?;

        let at_target = current.character_id == *target;

        if def.non_transferrable && !at_target {
            return Err(EngineError::NotTransferrable);
        }

        // Pool destinations other than the vault are filled by the remote
        // system, never by moves.
        if target.is_pseudo() && *target != CharacterId::Vault {
            return Err(EngineError::NotTransferrable);
        }

        let max = self.sync.max_transferable_quantity(&current);
        if quantity < 1 || quantity > max {
            return Err(EngineError::InvalidQuantity {
                requested: quantity,
                max,
            });
        }

        // The equip flag only means something for an equippable instanced
        // item landing on a real guardian.
        let want_equip = equip_on_target
            && def.equippable
            && current.is_instanced()
            && !target.is_pseudo();

        if at_target && !want_equip {
            tracing::debug!(item_hash = current.item_hash, "Already at target, no-op");
            return Ok(());
        }

        let plan = Self::plan(&current, target, want_equip);
        if plan.is_empty() {
            // Account-side rearrangements (pool -> vault) need no remote
            // call; the pools are already account-level.
            return Ok(());
        }

        tracing::info!(
            item_hash = current.item_hash,
            target = %target,
            quantity,
            steps = plan.len(),
            "Executing transfer"
        );

        let result = self.execute(&identity, &current, quantity, &plan).await;

        // Success or partial failure, reconcile against remote truth
        // rather than patching the index optimistically. A failed first
        // hop leaves the item in the vault; the refresh surfaces that.
        if let Err(e) = self.sync.refresh(true).await {
            tracing::warn!(error = %e, "Post-transfer reconciliation failed");
        }

        result
    }

    /// Ordered call sequence: at most (to vault, from vault, equip).
    fn plan(current: &Item, target: &CharacterId, want_equip: bool) -> Vec<PlannedCall> {
        let mut plan = Vec::new();

        if current.character_id != *target {
            if let Some(source) = current.character_id.guardian_id() {
                plan.push(PlannedCall::ToVault {
                    character_id: source.to_string(),
                });
            }
            if let Some(dest) = target.guardian_id() {
                plan.push(PlannedCall::FromVault {
                    character_id: dest.to_string(),
                });
            }
        }

        if want_equip {
            if let (Some(dest), Some(instance_id)) =
                (target.guardian_id(), current.instance_id.as_deref())
            {
                plan.push(PlannedCall::Equip {
                    character_id: dest.to_string(),
                    instance_id: instance_id.to_string(),
                });
            }
        }

        plan
    }

    /// Issue the planned calls strictly sequentially; the second hop's
    /// correctness depends on the first having completed.
    async fn execute(
        &self,
        identity: &AccountIdentity,
        item: &Item,
        quantity: u32,
        plan: &[PlannedCall],
    ) -> Result<()> {
        for call in plan {
            let step = call.step();
            let token = self
                .tokens
                .get_valid_token("item transfer")
                .await
                .map_err(|e| Self::step_error(step, e))?;

            let outcome = match call {
                PlannedCall::ToVault { character_id } => {
                    self.api
                        .transfer_item(
                            &token.access_token,
                            &TransferItemRequest {
                                item_reference_hash: item.item_hash,
                                item_id: item.instance_id.clone(),
                                stack_size: quantity,
                                transfer_to_vault: true,
                                character_id: character_id.clone(),
                                membership_type: identity.membership_type,
                            },
                        )
                        .await
                }
                PlannedCall::FromVault { character_id } => {
                    self.api
                        .transfer_item(
                            &token.access_token,
                            &TransferItemRequest {
                                item_reference_hash: item.item_hash,
                                item_id: item.instance_id.clone(),
                                stack_size: quantity,
                                transfer_to_vault: false,
                                character_id: character_id.clone(),
                                membership_type: identity.membership_type,
                            },
                        )
                        .await
                }
                PlannedCall::Equip {
                    character_id,
                    instance_id,
                } => {
                    self.api
                        .equip_item(
                            &token.access_token,
                            &EquipItemRequest {
                                item_id: instance_id.clone(),
                                character_id: character_id.clone(),
                                membership_type: identity.membership_type,
                            },
                        )
                        .await
                }
            };

            if let Err(e) = outcome {
                tracing::warn!(step = %step, error = %e, "Transfer step failed, aborting sequence");
                return Err(Self::step_error(step, e));
            }
        }

        Ok(())
    }

    /// Wrap a step failure, letting conditions with their own recovery
    /// path (re-login, maintenance banner) pass through unchanged.
    fn step_error(step: TransferStep, e: EngineError) -> EngineError {
        match e {
            EngineError::AuthExpired | EngineError::SystemDisabled => e,
            other => EngineError::TransferFailed {
                step,
                reason: other.to_string(),
            },
        }
    }
}
