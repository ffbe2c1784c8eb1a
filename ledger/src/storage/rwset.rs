// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Read/Write Sets
//!
//! A transaction never touches committed state directly. It accumulates:
//!
//! - **reads** — every key it looked at, with the version it saw (`None`
//!   when the key was absent),
//! - **ranges** — every range scan, with the exact `(key, version)` list it
//!   observed,
//! - **writes** — the buffered values it wants to put.
//!
//! At commit the store re-reads the versions under its commit lock. If any
//! point read or range result differs, the transaction is stale and none of
//! its writes are applied.

use std::collections::BTreeMap;

use super::error::{ConflictKind, StoreError, StoreResult};
use super::Version;

/// A range scan recorded for phantom detection. `high` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRead {
    pub low: String,
    pub high: String,
    pub observed: Vec<(String, Version)>,
}

/// Everything a transaction read and wants to write.
#[derive(Debug, Clone, Default)]
pub struct RwSet {
    pub reads: BTreeMap<String, Option<Version>>,
    pub ranges: Vec<RangeRead>,
    pub writes: BTreeMap<String, Vec<u8>>,
}

/// Version lookups a store exposes to the validator while it holds its
/// commit lock.
pub trait StateView {
    /// Version of the latest committed write to `key`, or `None` if absent.
    fn version_of(&self, key: &str) -> StoreResult<Option<Version>>;

    /// `(key, version)` pairs for committed keys in `[low, high)`, ordered.
    fn versions_in(&self, low: &str, high: &str) -> StoreResult<Vec<(String, Version)>>;
}

impl RwSet {
    /// Returns `true` if the transaction buffered no writes.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Checks every recorded read against the current committed state.
    pub fn validate<V: StateView + ?Sized>(&self, view: &V) -> StoreResult<()> {
        for (key, seen) in &self.reads {
            if view.version_of(key)? != *seen {
                return Err(StoreError::Conflict {
                    key: key.clone(),
                    kind: ConflictKind::ReadVersion,
                });
            }
        }

        for range in &self.ranges {
            if view.versions_in(&range.low, &range.high)? != range.observed {
                return Err(StoreError::Conflict {
                    key: range.low.clone(),
                    kind: ConflictKind::Phantom,
                });
            }
        }

        Ok(())
    }
}

/// Returns `true` when `[low, high)` cannot contain any key.
pub(crate) fn is_empty_range(low: &str, high: &str) -> bool {
    low >= high
}
