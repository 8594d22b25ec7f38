// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test harness: an in-memory remote API with a mutable inventory
//! world, plus engine wiring helpers.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use vault_courier::config::Config;
use vault_courier::error::{EngineError, Result};
use vault_courier::models::character::buckets;
use vault_courier::models::profile::{CharacterComponent, ItemComponent};
use vault_courier::models::{
    AccountIdentity, ItemDefinition, ProfileResponse, Token, TokenResponse,
};
use vault_courier::services::api::{EquipItemRequest, RemoteApi, TransferItemRequest};
use vault_courier::services::StaticDefinitions;
use vault_courier::storage::CacheStore;
use vault_courier::Engine;

pub const MEMBERSHIP_ID: &str = "4611686018467260757";
pub const MEMBERSHIP_TYPE: i32 = 3;

/// Generic character-side inventory bucket used by the mock world.
pub const CHAR_BUCKET: u32 = 2000;

/// Failure the mock should inject, settable per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    SystemDisabled,
    Network,
}

impl MockFailure {
    fn to_error(self) -> EngineError {
        match self {
            MockFailure::SystemDisabled => EngineError::SystemDisabled,
            MockFailure::Network => EngineError::Network("injected failure".to_string()),
        }
    }
}

/// One item in the mock remote world. `owner` is a guardian id or one of
/// the account-level pools ("vault", "consumables", "mods").
#[derive(Debug, Clone)]
pub struct WorldItem {
    pub item_hash: u32,
    pub instance_id: Option<String>,
    pub quantity: u32,
    pub owner: String,
    pub bucket_hash: u32,
    pub equipped: bool,
}

/// Authoritative remote state behind the mock API.
#[derive(Default)]
pub struct World {
    pub characters: Vec<String>,
    pub items: Vec<WorldItem>,
    /// Bumped on every rendered profile so minted timestamps strictly
    /// increase fetch over fetch.
    minted_counter: i64,
}

impl World {
    fn render(&mut self) -> ProfileResponse {
        self.minted_counter += 1;
        let minted: DateTime<Utc> = "2026-08-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
            + Duration::seconds(self.minted_counter);

        let mut characters = HashMap::new();
        let mut character_inventories: HashMap<String, Vec<ItemComponent>> = HashMap::new();
        let mut character_equipment: HashMap<String, Vec<ItemComponent>> = HashMap::new();
        for id in &self.characters {
            characters.insert(
                id.clone(),
                CharacterComponent {
                    character_id: id.clone(),
                    class_type: 1,
                    emblem_path: None,
                    light: 2000,
                },
            );
            character_inventories.insert(id.clone(), Vec::new());
            character_equipment.insert(id.clone(), Vec::new());
        }

        let mut profile_inventory = Vec::new();
        for item in &self.items {
            let component = ItemComponent {
                item_hash: item.item_hash,
                item_instance_id: item.instance_id.clone(),
                quantity: item.quantity,
                bucket_hash: item.bucket_hash,
            };
            match item.owner.as_str() {
                "vault" | "consumables" | "mods" => profile_inventory.push(component),
                guardian => {
                    let target = if item.equipped {
                        character_equipment.get_mut(guardian)
                    } else {
                        character_inventories.get_mut(guardian)
                    };
                    target.expect("world item owned by unknown character").push(component);
                }
            }
        }

        ProfileResponse {
            response_minted_timestamp: minted.to_rfc3339(),
            secondary_components_minted_timestamp: minted.to_rfc3339(),
            characters,
            character_inventories,
            character_equipment,
            profile_inventory,
        }
    }

    /// Mutate the world the way the real backend would apply a transfer.
    fn apply_transfer(&mut self, req: &TransferItemRequest) {
        let (from_owner, to_owner, to_bucket) = if req.transfer_to_vault {
            (req.character_id.clone(), "vault".to_string(), buckets::VAULT)
        } else {
            // Pulls take from whichever account-level pool holds the item
            let source = self
                .items
                .iter()
                .find(|i| {
                    i.item_hash == req.item_reference_hash
                        && matches!(i.owner.as_str(), "vault" | "consumables" | "mods")
                        && (req.item_id.is_none() || i.instance_id == req.item_id)
                })
                .map(|i| i.owner.clone())
                .unwrap_or_else(|| "vault".to_string());
            (source, req.character_id.clone(), CHAR_BUCKET)
        };

        let idx = self
            .items
            .iter()
            .position(|i| {
                i.item_hash == req.item_reference_hash
                    && i.owner == from_owner
                    && (req.item_id.is_none() || i.instance_id == req.item_id)
            })
            .expect("transfer source not in world");

        let moved_qty = req.stack_size.min(self.items[idx].quantity);
        if self.items[idx].quantity > moved_qty && self.items[idx].instance_id.is_none() {
            self.items[idx].quantity -= moved_qty;
        } else {
            self.items.remove(idx);
        }

        // Merge into an existing destination stack when possible
        if let Some(existing) = self.items.iter_mut().find(|i| {
            i.item_hash == req.item_reference_hash
                && i.owner == to_owner
                && i.instance_id.is_none()
                && req.item_id.is_none()
        }) {
            existing.quantity += moved_qty;
        } else {
            self.items.push(WorldItem {
                item_hash: req.item_reference_hash,
                instance_id: req.item_id.clone(),
                quantity: moved_qty,
                owner: to_owner,
                bucket_hash: to_bucket,
                equipped: false,
            });
        }
    }

    fn apply_equip(&mut self, req: &EquipItemRequest) {
        for item in &mut self.items {
            if item.instance_id.as_deref() == Some(req.item_id.as_str()) {
                item.equipped = true;
            }
        }
    }

    /// Total quantity of a hash across the whole world.
    pub fn total_quantity(&self, item_hash: u32) -> u32 {
        self.items
            .iter()
            .filter(|i| i.item_hash == item_hash)
            .map(|i| i.quantity)
            .sum()
    }
}

/// In-memory remote API double.
pub struct MockRemote {
    pub world: Mutex<World>,
    /// Custom responses served before falling back to the world
    pub profile_queue: Mutex<VecDeque<ProfileResponse>>,
    pub profile_failure: Mutex<Option<MockFailure>>,
    /// Error text returned by the next refresh calls while set
    pub refresh_error: Mutex<Option<String>>,
    /// Fail the Nth transfer_item call (1-based), one-shot
    pub fail_nth_transfer: Mutex<Option<u32>>,
    /// Artificial latency inside refresh_token, to widen race windows
    pub refresh_delay: std::time::Duration,
    pub refresh_calls: AtomicU32,
    pub profile_calls: AtomicU32,
    pub transfer_calls: Mutex<Vec<TransferItemRequest>>,
    pub equip_calls: Mutex<Vec<EquipItemRequest>>,
}

impl MockRemote {
    pub fn new(world: World) -> Arc<Self> {
        Arc::new(Self {
            world: Mutex::new(world),
            profile_queue: Mutex::new(VecDeque::new()),
            profile_failure: Mutex::new(None),
            refresh_error: Mutex::new(None),
            fail_nth_transfer: Mutex::new(None),
            refresh_delay: std::time::Duration::from_millis(0),
            refresh_calls: AtomicU32::new(0),
            profile_calls: AtomicU32::new(0),
            transfer_calls: Mutex::new(Vec::new()),
            equip_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn with_refresh_delay(world: World, delay: std::time::Duration) -> Arc<Self> {
        let mut mock = Self::new(world);
        Arc::get_mut(&mut mock).unwrap().refresh_delay = delay;
        mock
    }

    pub fn push_profile(&self, response: ProfileResponse) {
        self.profile_queue.lock().unwrap().push_back(response);
    }

    fn mint_token(&self, n: u32) -> TokenResponse {
        TokenResponse {
            access_token: format!("access-{}", n),
            refresh_token: format!("refresh-{}", n),
            expires_in: 3600,
            refresh_expires_in: 7_776_000,
            membership_id: MEMBERSHIP_ID.to_string(),
        }
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse> {
        Ok(self.mint_token(0))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.refresh_delay > std::time::Duration::ZERO {
            tokio::time::sleep(self.refresh_delay).await;
        }
        if let Some(msg) = self.refresh_error.lock().unwrap().clone() {
            return Err(EngineError::RefreshFailed(msg));
        }
        Ok(self.mint_token(n))
    }

    async fn get_profile(
        &self,
        _access_token: &str,
        _identity: &AccountIdentity,
    ) -> Result<ProfileResponse> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.profile_failure.lock().unwrap() {
            return Err(failure.to_error());
        }
        if let Some(queued) = self.profile_queue.lock().unwrap().pop_front() {
            return Ok(queued);
        }
        Ok(self.world.lock().unwrap().render())
    }

    async fn transfer_item(&self, _access_token: &str, req: &TransferItemRequest) -> Result<()> {
        let call_number = {
            let mut calls = self.transfer_calls.lock().unwrap();
            calls.push(req.clone());
            calls.len() as u32
        };
        let should_fail = {
            let mut nth = self.fail_nth_transfer.lock().unwrap();
            if *nth == Some(call_number) {
                nth.take();
                true
            } else {
                false
            }
        };
        if should_fail {
            return Err(EngineError::Network("injected transfer failure".to_string()));
        }
        self.world.lock().unwrap().apply_transfer(req);
        Ok(())
    }

    async fn equip_item(&self, _access_token: &str, req: &EquipItemRequest) -> Result<()> {
        self.equip_calls.lock().unwrap().push(req.clone());
        self.world.lock().unwrap().apply_equip(req);
        Ok(())
    }
}

// ─── Builders ────────────────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn test_identity() -> AccountIdentity {
    AccountIdentity {
        membership_id: MEMBERSHIP_ID.to_string(),
        membership_type: MEMBERSHIP_TYPE,
        display_name: "TestGuardian".to_string(),
        icon_path: None,
    }
}

/// Token with the given remaining validity windows, in seconds.
#[allow(dead_code)]
pub fn token_with(access_secs: i64, refresh_secs: i64) -> Token {
    let now = Utc::now();
    Token {
        access_token: "access-0".to_string(),
        refresh_token: "refresh-0".to_string(),
        access_expires_at: now + Duration::seconds(access_secs),
        refresh_expires_at: now + Duration::seconds(refresh_secs),
        issued_at: now - Duration::seconds(10),
    }
}

/// Standard definition table used by the transfer tests.
#[allow(dead_code)]
pub fn test_definitions() -> StaticDefinitions {
    let mut defs = HashMap::new();
    // Equippable instanced weapon
    defs.insert(
        100,
        ItemDefinition {
            bucket_hash: 1_498_876_634,
            equippable: true,
            non_transferrable: false,
            max_stack_size: 1,
        },
    );
    // Stackable crafting material
    defs.insert(
        500,
        ItemDefinition {
            bucket_hash: CHAR_BUCKET,
            equippable: false,
            non_transferrable: false,
            max_stack_size: 99,
        },
    );
    // Soulbound class item
    defs.insert(
        600,
        ItemDefinition {
            bucket_hash: 1_498_876_634,
            equippable: true,
            non_transferrable: true,
            max_stack_size: 1,
        },
    );
    StaticDefinitions::new(defs)
}

/// Wire an engine around the mock with a signed-in session holding a
/// valid token. The temp dir must outlive the engine.
#[allow(dead_code)]
pub fn test_engine(api: Arc<MockRemote>) -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::with_root(dir.path().to_path_buf()).unwrap();
    let engine = Engine::new(
        Config::test_default(),
        store,
        api as Arc<dyn RemoteApi>,
        Arc::new(test_definitions()),
    );

    *engine.identity.write().unwrap() = Some(test_identity());
    engine.tokens.install(token_with(3600, 7_776_000));
    (engine, dir)
}

/// Engine with no session at all.
#[allow(dead_code)]
pub fn test_engine_signed_out(api: Arc<MockRemote>) -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = CacheStore::with_root(dir.path().to_path_buf()).unwrap();
    let engine = Engine::new(
        Config::test_default(),
        store,
        api as Arc<dyn RemoteApi>,
        Arc::new(test_definitions()),
    );
    (engine, dir)
}

/// A profile response with explicit minted timestamps and no items.
#[allow(dead_code)]
pub fn profile_with_minted(response_ts: &str, secondary_ts: &str) -> ProfileResponse {
    ProfileResponse {
        response_minted_timestamp: response_ts.to_string(),
        secondary_components_minted_timestamp: secondary_ts.to_string(),
        characters: HashMap::new(),
        character_inventories: HashMap::new(),
        character_equipment: HashMap::new(),
        profile_inventory: Vec::new(),
    }
}

/// The default world: one guardian, a vault material stack, an instanced
/// weapon on the guardian, and a soulbound item.
#[allow(dead_code)]
pub fn default_world() -> World {
    World {
        characters: vec!["char-a".to_string(), "char-b".to_string()],
        items: vec![
            WorldItem {
                item_hash: 500,
                instance_id: None,
                quantity: 12,
                owner: "vault".to_string(),
                bucket_hash: buckets::VAULT,
                equipped: false,
            },
            WorldItem {
                item_hash: 100,
                instance_id: Some("ii-weapon".to_string()),
                quantity: 1,
                owner: "char-a".to_string(),
                bucket_hash: 1_498_876_634,
                equipped: false,
            },
            WorldItem {
                item_hash: 600,
                instance_id: Some("ii-bound".to_string()),
                quantity: 1,
                owner: "char-a".to_string(),
                bucket_hash: 1_498_876_634,
                equipped: false,
            },
        ],
        minted_counter: 0,
    }
}
