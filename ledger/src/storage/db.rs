// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SledStore — Persistent Partition Storage
//!
//! The persistent backend for a ledger partition, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! Each partition gets two named trees inside one sled `Db`, so the three
//! ledger tiers can share a single data directory without sharing keys:
//!
//! | Tree              | Key               | Value                    |
//! |-------------------|-------------------|--------------------------|
//! | `<partition>`     | key (UTF-8)       | `bincode(VersionedValue)`|
//! | `<partition>/meta`| `height`          | height (8B BE)           |
//!
//! sled orders keys lexicographically by bytes, which for UTF-8 keys is the
//! same order the range scans promise.
//!
//! ## Atomicity
//!
//! Validation runs under a per-store commit mutex; the writes and the new
//! height are then applied in one multi-tree sled transaction. Open exactly
//! one `SledStore` per partition tree: two handles on the same tree would
//! not share the commit mutex.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use sled::transaction::{ConflictableTransactionResult, TransactionError, Transactional};
use sled::{Batch, Db, Tree};

use super::error::{StoreError, StoreResult};
use super::rwset::{is_empty_range, RwSet, StateView};
use super::{Version, VersionedStore, VersionedValue};

/// Well-known key in the metadata tree for the latest commit height.
const META_HEIGHT: &[u8] = b"height";

/// Persistent versioned store for one partition.
///
/// Cloning is cheap and clones share the same commit mutex.
#[derive(Debug, Clone)]
pub struct SledStore {
    /// The underlying sled database handle.
    db: Db,
    /// Partition entries.
    entries: Tree,
    /// Commit height.
    metadata: Tree,
    /// Serializes validate-then-apply across commits.
    commit_lock: Arc<Mutex<()>>,
}

impl SledStore {
    /// Open or create a database at `path` and bind the partition's trees.
    pub fn open<P: AsRef<Path>>(path: P, partition: &str) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(&db, partition)
    }

    /// Temporary database that is removed when the last handle drops.
    pub fn open_temporary(partition: &str) -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db, partition)
    }

    /// Binds a partition's trees inside an existing sled `Db`.
    pub fn from_db(db: &Db, partition: &str) -> StoreResult<Self> {
        let entries = db.open_tree(partition)?;
        let metadata = db.open_tree(format!("{partition}/meta"))?;
        Ok(Self {
            db: db.clone(),
            entries,
            metadata,
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Number of keys stored in the partition.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the partition holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn decode_value(bytes: &[u8]) -> StoreResult<VersionedValue> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode_key(bytes: &[u8]) -> StoreResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn scan(&self, low: &str, high: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        if is_empty_range(low, high) {
            return Ok(Vec::new());
        }
        let mut rows = Vec::new();
        for result in self.entries.range(low.as_bytes()..high.as_bytes()) {
            let (key, value) = result?;
            rows.push((Self::decode_key(&key)?, Self::decode_value(&value)?));
        }
        Ok(rows)
    }
}

impl StateView for SledStore {
    fn version_of(&self, key: &str) -> StoreResult<Option<Version>> {
        Ok(VersionedStore::get(self, key)?.map(|v| v.version))
    }

    fn versions_in(&self, low: &str, high: &str) -> StoreResult<Vec<(String, Version)>> {
        Ok(self
            .scan(low, high)?
            .into_iter()
            .map(|(k, v)| (k, v.version))
            .collect())
    }
}

impl VersionedStore for SledStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        match self.entries.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn range(&self, low: &str, high: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        self.scan(low, high)
    }

    fn commit(&self, rwset: &RwSet) -> StoreResult<Version> {
        let _guard = self.commit_lock.lock();
        rwset.validate(self)?;

        let height = self.height()?;
        if rwset.is_read_only() {
            return Ok(height);
        }

        let version = height + 1;
        let mut batch = Batch::default();
        for (key, value) in &rwset.writes {
            let envelope = VersionedValue {
                version,
                value: value.clone(),
            };
            let bytes = bincode::serialize(&envelope)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            batch.insert(key.as_bytes(), bytes);
        }

        let height_bytes = version.to_be_bytes();
        (&self.entries, &self.metadata)
            .transaction(|(entries, metadata)| -> ConflictableTransactionResult<(), ()> {
                entries.apply_batch(&batch)?;
                metadata.insert(META_HEIGHT, &height_bytes[..])?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Storage(e) => StoreError::Sled(e),
                TransactionError::Abort(()) => {
                    StoreError::Serialization("commit transaction aborted".to_string())
                }
            })?;

        tracing::trace!(version, writes = rwset.writes.len(), "sled commit applied");
        Ok(version)
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn height(&self) -> StoreResult<Version> {
        match self.metadata.get(META_HEIGHT)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Serialization("invalid height bytes".to_string()))?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
