// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! In-memory versioned store.
//!
//! A sorted `BTreeMap` behind a `parking_lot::RwLock`. Reads take the shared
//! lock; a commit takes the exclusive lock for validation and apply, which is
//! what makes it atomic with respect to other commits.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::error::StoreResult;
use super::rwset::{is_empty_range, RwSet, StateView};
use super::{Version, VersionedStore, VersionedValue};

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, VersionedValue>,
    height: Version,
}

impl StateView for Inner {
    fn version_of(&self, key: &str) -> StoreResult<Option<Version>> {
        Ok(self.entries.get(key).map(|v| v.version))
    }

    fn versions_in(&self, low: &str, high: &str) -> StoreResult<Vec<(String, Version)>> {
        Ok(self
            .scan(low, high)
            .into_iter()
            .map(|(k, v)| (k, v.version))
            .collect())
    }
}

impl Inner {
    fn scan(&self, low: &str, high: &str) -> Vec<(String, VersionedValue)> {
        if is_empty_range(low, high) {
            return Vec::new();
        }
        self.entries
            .range::<str, _>((
                std::ops::Bound::Included(low),
                std::ops::Bound::Excluded(high),
            ))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Versioned store held entirely in memory. Used for tests and for
/// networks that do not need to survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store at height 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns `true` if nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

impl VersionedStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        Ok(self.inner.read().entries.get(key).cloned())
    }

    fn range(&self, low: &str, high: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        Ok(self.inner.read().scan(low, high))
    }

    fn commit(&self, rwset: &RwSet) -> StoreResult<Version> {
        let mut inner = self.inner.write();
        rwset.validate(&*inner)?;

        if rwset.is_read_only() {
            return Ok(inner.height);
        }

        let version = inner.height + 1;
        for (key, value) in &rwset.writes {
            inner.entries.insert(
                key.clone(),
                VersionedValue {
                    version,
                    value: value.clone(),
                },
            );
        }
        inner.height = version;
        Ok(version)
    }

    fn height(&self) -> StoreResult<Version> {
        Ok(self.inner.read().height)
    }
}
