// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile snapshot model and the remote payload it is built from.
//!
//! A snapshot is produced wholesale by one successful, validated fetch and
//! is never partially mutated; each accepted fetch replaces the previous
//! snapshot atomically.

use crate::error::{EngineError, Result};
use crate::models::character::{buckets, Character, CharacterId, ClassType};
use crate::models::item::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Location address of a section: one character (real or pseudo) and one
/// bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionKey {
    pub character_id: CharacterId,
    pub bucket_hash: u32,
}

/// One addressable slot group: at most one equipped item plus unequipped
/// inventory. Pseudo-character sections never have an equipped slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub key: SectionKey,
    pub equipped: Option<Item>,
    pub inventory: Vec<Item>,
}

impl Section {
    fn new(key: SectionKey) -> Self {
        Self {
            key,
            equipped: None,
            inventory: Vec::new(),
        }
    }

    /// All items in this section, equipped first.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.equipped.iter().chain(self.inventory.iter())
    }
}

/// One complete, internally consistent view of the remote inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub response_minted: DateTime<Utc>,
    pub secondary_components_minted: DateTime<Utc>,
    pub characters: Vec<Character>,
    pub sections: Vec<Section>,
}

impl ProfileSnapshot {
    /// Strict dual-timestamp freshness: this snapshot may replace `other`
    /// only when BOTH minted timestamps are strictly later. Guards against
    /// the backend serving a cached response right after a mutation.
    pub fn is_fresher_than(&self, other: &ProfileSnapshot) -> bool {
        self.response_minted > other.response_minted
            && self.secondary_components_minted > other.secondary_components_minted
    }

    /// Guardians only, in remote order.
    pub fn guardians(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| !c.id.is_pseudo())
    }

    /// Find a section by address. Linear scan; the location index holds
    /// the real lookup structures.
    pub fn section(&self, character_id: &CharacterId, bucket_hash: u32) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| &s.key.character_id == character_id && s.key.bucket_hash == bucket_hash)
    }

    /// Validate and convert a remote payload into a snapshot.
    ///
    /// A structurally invalid payload yields `Validation` and must never
    /// touch the installed snapshot.
    pub fn from_response(resp: ProfileResponse) -> Result<ProfileSnapshot> {
        let response_minted = parse_minted(&resp.response_minted_timestamp, "responseMintedTimestamp")?;
        let secondary_components_minted = parse_minted(
            &resp.secondary_components_minted_timestamp,
            "secondaryComponentsMintedTimestamp",
        )?;

        let mut characters: Vec<Character> = Vec::new();
        let mut known_ids: HashSet<String> = HashSet::new();
        for (id, data) in &resp.characters {
            if id != &data.character_id {
                return Err(EngineError::Validation(format!(
                    "character map key {} does not match characterId {}",
                    id, data.character_id
                )));
            }
            known_ids.insert(id.clone());
            characters.push(Character {
                id: CharacterId::Guardian(id.clone()),
                class_type: ClassType::from(data.class_type),
                emblem_path: data.emblem_path.clone(),
                light: data.light,
            });
        }
        characters.extend(Character::all_pseudo());

        let mut builder = SectionBuilder::default();

        for (char_id, items) in &resp.character_equipment {
            if !known_ids.contains(char_id) {
                return Err(EngineError::Validation(format!(
                    "equipment for unknown character {}",
                    char_id
                )));
            }
            let owner = CharacterId::Guardian(char_id.clone());
            for raw in items {
                let item = raw.to_item(owner.clone(), true)?;
                builder.place_equipped(item)?;
            }
        }

        for (char_id, items) in &resp.character_inventories {
            if !known_ids.contains(char_id) {
                return Err(EngineError::Validation(format!(
                    "inventory for unknown character {}",
                    char_id
                )));
            }
            let owner = CharacterId::Guardian(char_id.clone());
            for raw in items {
                let item = raw.to_item(owner.clone(), false)?;
                builder.place(item);
            }
        }

        for raw in &resp.profile_inventory {
            // Profile-level items route to their owning pseudo-pool by
            // bucket hash; everything unrecognized is vault storage.
            let owner = match raw.bucket_hash {
                buckets::CONSUMABLES => CharacterId::Consumables,
                buckets::MODIFICATIONS => CharacterId::Mods,
                _ => CharacterId::Vault,
            };
            let item = raw.to_item(owner, false)?;
            builder.place(item);
        }

        builder.check_instances_unique()?;

        Ok(ProfileSnapshot {
            response_minted,
            secondary_components_minted,
            characters,
            sections: builder.into_sections(),
        })
    }
}

fn parse_minted(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Validation(format!("unparseable {}: {}", field, e)))
}

/// Accumulates items into sections keyed by (character, bucket).
#[derive(Default)]
struct SectionBuilder {
    sections: HashMap<SectionKey, Section>,
    order: Vec<SectionKey>,
}

impl SectionBuilder {
    fn entry(&mut self, key: SectionKey) -> &mut Section {
        if !self.sections.contains_key(&key) {
            self.order.push(key.clone());
            self.sections.insert(key.clone(), Section::new(key.clone()));
        }
        self.sections.get_mut(&key).unwrap()
    }

    fn key_for(item: &Item) -> SectionKey {
        SectionKey {
            character_id: item.character_id.clone(),
            bucket_hash: item.bucket_hash,
        }
    }

    fn place(&mut self, item: Item) {
        let key = Self::key_for(&item);
        self.entry(key).inventory.push(item);
    }

    fn place_equipped(&mut self, item: Item) -> Result<()> {
        let key = Self::key_for(&item);
        let section = self.entry(key);
        if let Some(existing) = &section.equipped {
            return Err(EngineError::Validation(format!(
                "two equipped items in bucket {} of {}: {} and {}",
                item.bucket_hash, item.character_id, existing.item_hash, item.item_hash
            )));
        }
        section.equipped = Some(item);
        Ok(())
    }

    /// An instanced item must appear exactly once across the whole
    /// snapshot.
    fn check_instances_unique(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for section in self.sections.values() {
            for item in section.items() {
                if let Some(id) = item.instance_id.as_deref() {
                    if !seen.insert(id) {
                        return Err(EngineError::Validation(format!(
                            "instance {} appears more than once",
                            id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn into_sections(mut self) -> Vec<Section> {
        self.order
            .iter()
            .filter_map(|k| self.sections.remove(k))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire payload
// ─────────────────────────────────────────────────────────────────────────────

/// Raw profile payload from the remote API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub response_minted_timestamp: String,
    pub secondary_components_minted_timestamp: String,
    #[serde(default)]
    pub characters: HashMap<String, CharacterComponent>,
    #[serde(default)]
    pub character_inventories: HashMap<String, Vec<ItemComponent>>,
    #[serde(default)]
    pub character_equipment: HashMap<String, Vec<ItemComponent>>,
    #[serde(default)]
    pub profile_inventory: Vec<ItemComponent>,
}

/// Raw character entry from the profile payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterComponent {
    pub character_id: String,
    pub class_type: i32,
    #[serde(default)]
    pub emblem_path: Option<String>,
    #[serde(default)]
    pub light: u32,
}

/// Raw item entry from inventory/equipment components.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemComponent {
    pub item_hash: u32,
    #[serde(default)]
    pub item_instance_id: Option<String>,
    pub quantity: u32,
    pub bucket_hash: u32,
}

impl ItemComponent {
    fn to_item(&self, owner: CharacterId, equipped: bool) -> Result<Item> {
        if self.quantity == 0 {
            return Err(EngineError::Validation(format!(
                "item {} has zero quantity",
                self.item_hash
            )));
        }
        if self.item_instance_id.is_some() && self.quantity != 1 {
            return Err(EngineError::Validation(format!(
                "instanced item {} has quantity {}",
                self.item_hash, self.quantity
            )));
        }
        if equipped && self.item_instance_id.is_none() {
            return Err(EngineError::Validation(format!(
                "equipped item {} has no instance id",
                self.item_hash
            )));
        }
        Ok(Item {
            item_hash: self.item_hash,
            instance_id: self.item_instance_id.clone(),
            quantity: self.quantity,
            character_id: owner,
            bucket_hash: self.bucket_hash,
            equipped,
        })
    }
}
