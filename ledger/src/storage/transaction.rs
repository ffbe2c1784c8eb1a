// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Transactions
//!
//! A [`Transaction`] is a buffered view over one store. Reads go to the
//! committed state (and record the version they saw); writes go to a local
//! buffer. Nothing is visible to anyone else until [`Transaction::commit`]
//! succeeds, and a dropped transaction leaves no trace.
//!
//! Reads observe the transaction's own pending writes. The version recorded
//! for validation is always the committed one, so a read-your-own-write
//! still conflicts if another commit rewrote the key underneath.

use std::collections::btree_map::Entry;
use std::sync::Arc;

use super::error::StoreResult;
use super::rwset::{is_empty_range, RangeRead, RwSet};
use super::{Version, VersionedStore};

/// Buffered read/write transaction over a [`VersionedStore`].
#[derive(Debug)]
pub struct Transaction {
    store: Arc<dyn VersionedStore>,
    rwset: RwSet,
}

impl Transaction {
    /// Starts a transaction against `store`.
    pub fn begin(store: Arc<dyn VersionedStore>) -> Self {
        Self {
            store,
            rwset: RwSet::default(),
        }
    }

    /// Reads `key`, preferring this transaction's pending write.
    pub fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let committed = self.store.get(key)?;
        if let Entry::Vacant(slot) = self.rwset.reads.entry(key.to_string()) {
            slot.insert(committed.as_ref().map(|v| v.version));
        }

        if let Some(pending) = self.rwset.writes.get(key) {
            return Ok(Some(pending.clone()));
        }
        Ok(committed.map(|v| v.value))
    }

    /// Buffers a write. Last write to a key wins.
    pub fn put(&mut self, key: &str, value: Vec<u8>) {
        self.rwset.writes.insert(key.to_string(), value);
    }

    /// Scans `[low, high)` and records the observed range for phantom
    /// detection. Pending writes inside the range are merged in.
    pub fn range_scan(&mut self, low: &str, high: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let committed = self.store.range(low, high)?;
        self.rwset.ranges.push(RangeRead {
            low: low.to_string(),
            high: high.to_string(),
            observed: committed
                .iter()
                .map(|(k, v)| (k.clone(), v.version))
                .collect(),
        });

        let mut merged: std::collections::BTreeMap<String, Vec<u8>> = committed
            .into_iter()
            .map(|(k, v)| (k, v.value))
            .collect();
        if !is_empty_range(low, high) {
            for (key, value) in &self.rwset.writes {
                if key.as_str() >= low && key.as_str() < high {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    /// The read/write set accumulated so far.
    pub fn rwset(&self) -> &RwSet {
        &self.rwset
    }

    /// Returns `true` if the transaction has buffered writes.
    pub fn has_writes(&self) -> bool {
        !self.rwset.is_read_only()
    }

    /// Validates and applies the transaction. Consumes it either way.
    pub fn commit(self) -> StoreResult<Version> {
        self.store.commit(&self.rwset)
    }
}
