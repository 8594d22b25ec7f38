// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Item definition loading.
//!
//! The manifest decoder itself is an external collaborator; this module
//! provides the in-memory lookup the engine consumes and a bounded retry
//! policy around downloading the decoded table.

use crate::error::{EngineError, Result};
use crate::models::item::{DefinitionLookup, ItemDefinition};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Hard cap on definition download attempts.
pub const MAX_DOWNLOAD_ATTEMPTS: u32 = 5;

/// Fixed backoff between attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// A source of the decoded `item_hash -> ItemDefinition` table.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn fetch(&self) -> Result<HashMap<u32, ItemDefinition>>;
}

/// Immutable in-memory definition table.
#[derive(Debug, Default)]
pub struct StaticDefinitions {
    defs: HashMap<u32, ItemDefinition>,
}

impl StaticDefinitions {
    pub fn new(defs: HashMap<u32, ItemDefinition>) -> Self {
        Self { defs }
    }

    /// Load a pre-decoded definition table from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Storage(format!("read definitions: {}", e)))?;
        let defs: HashMap<u32, ItemDefinition> = serde_json::from_str(&content)
            .map_err(|e| EngineError::Validation(format!("parse definitions: {}", e)))?;
        tracing::info!(count = defs.len(), "Loaded item definitions");
        Ok(Self { defs })
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl DefinitionLookup for StaticDefinitions {
    fn lookup(&self, item_hash: u32) -> Option<ItemDefinition> {
        self.defs.get(&item_hash).cloned()
    }
}

/// Download the definition table with a bounded retry policy.
///
/// Retries up to [`MAX_DOWNLOAD_ATTEMPTS`] times with a fixed backoff and
/// then gives up with `DefinitionsUnavailable`; callers treat that as a
/// "definitions unavailable, retry later" state.
pub async fn load_definitions(source: &dyn DefinitionSource) -> Result<StaticDefinitions> {
    load_definitions_with(source, MAX_DOWNLOAD_ATTEMPTS, RETRY_BACKOFF).await
}

/// Retry-parameterized variant of [`load_definitions`].
pub async fn load_definitions_with(
    source: &dyn DefinitionSource,
    max_attempts: u32,
    backoff: Duration,
) -> Result<StaticDefinitions> {
    debug_assert!(max_attempts >= 1);
    for attempt in 1..=max_attempts {
        match source.fetch().await {
            Ok(defs) => {
                tracing::info!(count = defs.len(), attempt, "Item definitions downloaded");
                return Ok(StaticDefinitions::new(defs));
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(error = %e, attempt, "Definition download failed, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                tracing::error!(error = %e, attempt, "Definition download failed, giving up");
            }
        }
    }
    Err(EngineError::DefinitionsUnavailable {
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` fetches, then succeeds.
    struct FlakySource {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DefinitionSource for FlakySource {
        async fn fetch(&self) -> Result<HashMap<u32, ItemDefinition>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(EngineError::Network("definition CDN timeout".to_string()));
            }
            let mut defs = HashMap::new();
            defs.insert(
                42,
                ItemDefinition {
                    bucket_hash: 1,
                    equippable: true,
                    non_transferrable: false,
                    max_stack_size: 1,
                },
            );
            Ok(defs)
        }
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let source = FlakySource {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let defs = load_definitions_with(&source, 5, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cap_is_hard() {
        let source = FlakySource {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let err = load_definitions_with(&source, 5, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DefinitionsUnavailable { attempts: 5 }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let defs = StaticDefinitions::default();
        assert!(defs.lookup(999).is_none());
    }
}
