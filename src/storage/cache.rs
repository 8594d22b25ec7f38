// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort local cache for tokens, identity and the last accepted
//! snapshot.
//!
//! Everything is stored as JSON blobs in the per-user data directory;
//! token and snapshot files are keyed by membership id. The cache is
//! write-behind: the engine never blocks on it being current.

use crate::error::{EngineError, Result};
use crate::models::{AccountIdentity, ProfileSnapshot, Token};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

/// File-backed cache store.
#[derive(Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Open the cache in the platform data directory.
    pub fn open() -> Result<Self> {
        let root = directories::ProjectDirs::from("dev", "rolandd", "vault-courier")
            .ok_or_else(|| EngineError::Storage("could not determine data directory".to_string()))?
            .data_dir()
            .to_path_buf();
        Self::with_root(root)
    }

    /// Open the cache at an explicit root (tests use a temp dir).
    pub fn with_root(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .map_err(|e| EngineError::Storage(format!("create cache dir: {}", e)))?;
        Ok(Self { root })
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string(value)
            .map_err(|e| EngineError::Storage(format!("serialize {}: {}", name, e)))?;
        fs::write(self.root.join(name), content)
            .map_err(|e| EngineError::Storage(format!("write {}: {}", name, e)))
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.root.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| EngineError::Storage(format!("read {}: {}", name, e)))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| EngineError::Storage(format!("parse {}: {}", name, e)))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.root.join(name);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| EngineError::Storage(format!("delete {}: {}", name, e)))?;
        }
        Ok(())
    }

    // ─── Tokens ──────────────────────────────────────────────────────────────

    pub fn save_token(&self, membership_id: &str, token: &Token) -> Result<()> {
        self.write_json(&format!("token-{}.json", membership_id), token)
    }

    pub fn load_token(&self, membership_id: &str) -> Result<Option<Token>> {
        self.read_json(&format!("token-{}.json", membership_id))
    }

    pub fn delete_token(&self, membership_id: &str) -> Result<()> {
        self.delete(&format!("token-{}.json", membership_id))
    }

    // ─── Identity ────────────────────────────────────────────────────────────

    pub fn save_identity(&self, identity: &AccountIdentity) -> Result<()> {
        self.write_json("account.json", identity)
    }

    pub fn load_identity(&self) -> Result<Option<AccountIdentity>> {
        self.read_json("account.json")
    }

    pub fn delete_identity(&self) -> Result<()> {
        self.delete("account.json")
    }

    // ─── Snapshot ────────────────────────────────────────────────────────────

    pub fn save_snapshot(&self, membership_id: &str, snapshot: &ProfileSnapshot) -> Result<()> {
        self.write_json(&format!("profile-{}.json", membership_id), snapshot)
    }

    pub fn load_snapshot(&self, membership_id: &str) -> Result<Option<ProfileSnapshot>> {
        self.read_json(&format!("profile-{}.json", membership_id))
    }

    pub fn delete_snapshot(&self, membership_id: &str) -> Result<()> {
        self.delete(&format!("profile-{}.json", membership_id))
    }

    /// Remove every blob belonging to an account (logout).
    pub fn clear_account(&self, membership_id: &str) -> Result<()> {
        self.delete_token(membership_id)?;
        self.delete_snapshot(membership_id)?;
        self.delete_identity()
    }
}
