// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Characters and pseudo-characters.
//!
//! Pseudo-characters give account-wide item pools (vault, mods,
//! consumables, postmaster lost items) the same addressing scheme as real
//! guardians, so one location index covers everything.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known bucket hashes used to route profile-level items into their
/// owning pseudo-character pool.
pub mod buckets {
    /// Vault (general account storage)
    pub const VAULT: u32 = 138_197_802;
    /// Account-wide consumables pool
    pub const CONSUMABLES: u32 = 1_469_714_392;
    /// Account-wide modifications pool
    pub const MODIFICATIONS: u32 = 3_313_201_758;
    /// Per-character lost items (postmaster)
    pub const LOST_ITEMS: u32 = 215_593_132;
}

/// A location that can own items: a real guardian or one of the fixed
/// pseudo-characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CharacterId {
    /// A real guardian, keyed by its remote character id
    Guardian(String),
    Vault,
    Mods,
    Consumables,
    LostItems,
}

impl CharacterId {
    /// True for the fixed account-level pools (everything but a guardian).
    pub fn is_pseudo(&self) -> bool {
        !matches!(self, CharacterId::Guardian(_))
    }

    /// Remote character id for API calls. Pseudo-characters have none.
    pub fn guardian_id(&self) -> Option<&str> {
        match self {
            CharacterId::Guardian(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterId::Guardian(id) => write!(f, "{}", id),
            CharacterId::Vault => write!(f, "vault"),
            CharacterId::Mods => write!(f, "mods"),
            CharacterId::Consumables => write!(f, "consumables"),
            CharacterId::LostItems => write!(f, "lost-items"),
        }
    }
}

impl From<CharacterId> for String {
    fn from(id: CharacterId) -> String {
        id.to_string()
    }
}

impl TryFrom<String> for CharacterId {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(match s.as_str() {
            "vault" => CharacterId::Vault,
            "mods" => CharacterId::Mods,
            "consumables" => CharacterId::Consumables,
            "lost-items" => CharacterId::LostItems,
            _ => CharacterId::Guardian(s),
        })
    }
}

/// Guardian class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassType {
    Titan,
    Hunter,
    Warlock,
    /// Pseudo-characters and unrecognized classes
    Unknown,
}

impl From<i32> for ClassType {
    fn from(v: i32) -> Self {
        match v {
            0 => ClassType::Titan,
            1 => ClassType::Hunter,
            2 => ClassType::Warlock,
            _ => ClassType::Unknown,
        }
    }
}

/// A guardian or pseudo-character with its display assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub class_type: ClassType,
    /// Emblem image path, if any (pseudo-characters have none)
    pub emblem_path: Option<String>,
    /// Power/light level for display (0 for pseudo-characters)
    pub light: u32,
}

impl Character {
    /// Build one of the fixed pseudo-characters.
    pub fn pseudo(id: CharacterId) -> Self {
        debug_assert!(id.is_pseudo());
        Self {
            id,
            class_type: ClassType::Unknown,
            emblem_path: None,
            light: 0,
        }
    }

    /// The full set of pseudo-characters present in every snapshot.
    pub fn all_pseudo() -> Vec<Character> {
        [
            CharacterId::Vault,
            CharacterId::Mods,
            CharacterId::Consumables,
            CharacterId::LostItems,
        ]
        .into_iter()
        .map(Character::pseudo)
        .collect()
    }
}
