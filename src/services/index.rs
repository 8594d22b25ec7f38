// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Location index over the installed profile snapshot.
//!
//! Rebuilt wholesale from each accepted snapshot and swapped together with
//! it, so readers are always consistent with whichever snapshot is
//! currently installed. Pure read path, no mutable state.

use crate::error::{EngineError, Result};
use crate::models::character::buckets;
use crate::models::{CharacterId, Item, ItemIdentifier, ProfileSnapshot};
use std::collections::HashMap;

/// Addressable lookup over one snapshot.
pub struct LocationIndex {
    /// Instanced items by instance id
    by_instance: HashMap<String, Item>,
    /// Stack entries grouped by (owning character, item hash)
    stacks: HashMap<(CharacterId, u32), Vec<Item>>,
}

impl LocationIndex {
    /// Build the index from a snapshot.
    pub fn build(snapshot: &ProfileSnapshot) -> Self {
        let mut by_instance = HashMap::new();
        let mut stacks: HashMap<(CharacterId, u32), Vec<Item>> = HashMap::new();

        for section in &snapshot.sections {
            for item in section.items() {
                match &item.instance_id {
                    Some(id) => {
                        by_instance.insert(id.clone(), item.clone());
                    }
                    None => {
                        stacks
                            .entry((item.character_id.clone(), item.item_hash))
                            .or_default()
                            .push(item.clone());
                    }
                }
            }
        }

        Self { by_instance, stacks }
    }

    /// Find an item by identifier.
    ///
    /// Instanced lookups match by instance id. Stackable lookups match by
    /// hash within the identified character's sections - the same material
    /// can sit independently in several characters' pools, so the
    /// character disambiguates.
    pub fn find_item(&self, ident: &ItemIdentifier) -> Result<Item> {
        if let Some(instance_id) = &ident.instance_id {
            return self
                .by_instance
                .get(instance_id)
                .cloned()
                .ok_or_else(|| EngineError::ItemNotFound(format!("instance {}", instance_id)));
        }

        let entries = match &ident.character_id {
            // The lost-items pseudo-character aggregates every guardian's
            // postmaster; first match wins.
            CharacterId::LostItems => self
                .stacks
                .iter()
                .filter(|((_, hash), _)| *hash == ident.item_hash)
                .flat_map(|(_, items)| items.iter())
                .find(|item| item.bucket_hash == buckets::LOST_ITEMS),
            owner => self
                .stacks
                .get(&(owner.clone(), ident.item_hash))
                .and_then(|items| items.first()),
        };

        entries.cloned().ok_or_else(|| {
            EngineError::ItemNotFound(format!(
                "item {} on {}",
                ident.item_hash, ident.character_id
            ))
        })
    }

    /// Total quantity that can be moved out of the item's current scope.
    ///
    /// Instanced items always answer 1. Stackable items sum every stack
    /// entry sharing the hash in scope: the owning guardian for
    /// character-resident stacks (postmaster stacks only count the
    /// postmaster), the account-level pools for vault/pool-resident
    /// stacks.
    pub fn max_transferable_quantity(&self, item: &Item) -> u32 {
        if item.is_instanced() {
            return 1;
        }

        let in_postmaster = item.bucket_hash == buckets::LOST_ITEMS;
        self.stacks
            .iter()
            .filter(|((owner, hash), _)| {
                *hash == item.item_hash && Self::same_scope(owner, &item.character_id)
            })
            .flat_map(|(_, items)| items.iter())
            .filter(|entry| (entry.bucket_hash == buckets::LOST_ITEMS) == in_postmaster)
            .map(|entry| entry.quantity)
            .sum()
    }

    /// Guardians scope to themselves; all pseudo-characters share the
    /// account-level scope.
    fn same_scope(a: &CharacterId, b: &CharacterId) -> bool {
        a == b || (a.is_pseudo() && b.is_pseudo())
    }

    /// Number of indexed items (instanced + stack entries).
    pub fn len(&self) -> usize {
        self.by_instance.len() + self.stacks.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
