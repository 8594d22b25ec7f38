// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Item models and the read-only definition lookup seam.

use crate::models::character::CharacterId;
use serde::{Deserialize, Serialize};

/// An item at a known location.
///
/// Items with an instance id are unique (quantity is always 1, equip state
/// is meaningful). Items without one are stackable: several independent
/// stacks with the same hash may coexist across sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_hash: u32,
    pub instance_id: Option<String>,
    pub quantity: u32,
    /// Current owning location
    pub character_id: CharacterId,
    pub bucket_hash: u32,
    pub equipped: bool,
}

impl Item {
    pub fn is_instanced(&self) -> bool {
        self.instance_id.is_some()
    }
}

/// Identifies an item to look up: by instance id when instanced, by hash
/// within a specific character's sections when stackable.
#[derive(Debug, Clone)]
pub struct ItemIdentifier {
    pub item_hash: u32,
    pub instance_id: Option<String>,
    pub character_id: CharacterId,
}

impl ItemIdentifier {
    /// Identifier for the item as currently located.
    pub fn of(item: &Item) -> Self {
        Self {
            item_hash: item.item_hash,
            instance_id: item.instance_id.clone(),
            character_id: item.character_id.clone(),
        }
    }
}

/// Static item metadata from the definition collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub bucket_hash: u32,
    pub equippable: bool,
    pub non_transferrable: bool,
    pub max_stack_size: u32,
}

/// Read-only `item_hash -> ItemDefinition` lookup.
///
/// The manifest decoder behind this is an external collaborator; the
/// engine only consumes the map.
pub trait DefinitionLookup: Send + Sync {
    fn lookup(&self, item_hash: u32) -> Option<ItemDefinition>;
}
