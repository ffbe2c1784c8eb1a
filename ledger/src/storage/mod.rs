// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Storage Module
//!
//! The versioned key-value store every ledger partition lives on. Each
//! partition owns one store instance (or one sled tree); partitions never
//! share keys and never commit together.
//!
//! ## Architecture
//!
//! ```text
//! error.rs       — StoreError, ConflictKind
//! rwset.rs       — read/write sets and commit-time validation
//! transaction.rs — Transaction: buffered reads and writes over a store
//! memory.rs      — MemoryStore: BTreeMap behind a RwLock
//! db.rs          — SledStore: sled tree per partition, bincode envelopes
//! ```
//!
//! ## Concurrency Model
//!
//! Optimistic multi-version concurrency control. A transaction reads
//! committed state, buffers its writes, and at commit the store checks that
//! nothing it read has changed since. Every successful commit stamps all of
//! its writes with one new version (the store's height). There are no locks
//! held across a transaction, and a losing transaction is simply dropped.

pub mod db;
pub mod error;
pub mod memory;
pub mod rwset;
pub mod transaction;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;

pub use db::SledStore;
pub use error::{ConflictKind, StoreError, StoreResult};
pub use memory::MemoryStore;
pub use rwset::{RangeRead, RwSet, StateView};
pub use transaction::Transaction;

/// Commit height of a store. Version 0 means "never written".
pub type Version = u64;

/// A committed value together with the version of the commit that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub version: Version,
    pub value: Vec<u8>,
}

/// A versioned key-value store with commit-time conflict detection.
///
/// Keys are flat UTF-8 strings and compare lexicographically. Implementations
/// must make [`commit`](Self::commit) atomic: validation and the application
/// of every write happen as one step with respect to other commits.
pub trait VersionedStore: Send + Sync + std::fmt::Debug {
    /// Latest committed value for `key`.
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>>;

    /// Committed entries with keys in `[low, high)`, in key order.
    fn range(&self, low: &str, high: &str) -> StoreResult<Vec<(String, VersionedValue)>>;

    /// Validates `rwset` against the committed state and applies its writes.
    ///
    /// Returns the new height. A read-only set is validated but does not
    /// advance the height.
    fn commit(&self, rwset: &RwSet) -> StoreResult<Version>;

    /// Version of the most recent commit.
    fn height(&self) -> StoreResult<Version>;

    /// Pushes committed state to durable storage. No-op for volatile stores.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Opens one store per partition name according to `config`.
///
/// All sled partitions share a single database handle, since sled allows
/// only one open handle per directory.
pub fn open_partitions(
    config: &StoreConfig,
    partitions: &[&str],
) -> StoreResult<Vec<Arc<dyn VersionedStore>>> {
    match config {
        StoreConfig::Memory => Ok(partitions
            .iter()
            .map(|_| Arc::new(MemoryStore::new()) as Arc<dyn VersionedStore>)
            .collect()),
        StoreConfig::Sled { path } => {
            let db = sled::open(path)?;
            partitions
                .iter()
                .map(|name| Ok(Arc::new(SledStore::from_db(&db, name)?) as Arc<dyn VersionedStore>))
                .collect()
        }
    }
}
