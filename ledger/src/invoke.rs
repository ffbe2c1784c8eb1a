// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Partitions and Cross-Partition Invocation
//!
//! A [`Partition`] is one contract's key space: an address plus the store it
//! lives on. Every operation runs inside a [`TxContext`] opened on exactly one
//! partition.
//!
//! Calling into another partition ([`Partition::invoke`]) opens a second,
//! independent transaction on the callee, runs the callee's logic, and commits
//! it before returning. There is no two-phase commit:
//!
//! ```text
//! caller tx ──begin──────────── invoke ──────────── commit? ──▶
//!                                 │
//! callee tx                       └─begin─run─commit─▶ (already durable)
//! ```
//!
//! If the caller's own commit later fails, the callee's writes stay. To make
//! that visible, every successful mutating invoke appends a [`RemoteLeg`] to
//! the caller's context, and a failed [`Partition::commit`] hands those legs
//! back inside [`CommitFailure`] so an orchestrator can compensate them.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{STATUS_CONFLICT, STATUS_ERROR};
use crate::storage::{StoreError, StoreResult, Transaction, Version, VersionedStore};

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Where a partition lives: contract name plus the channel it is served on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionAddress {
    pub name: String,
    pub channel: String,
}

impl PartitionAddress {
    pub fn new(name: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for PartitionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.channel)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A cross-partition call did not succeed. The status code is the only
/// signal the caller gets; the message is the callee's error text.
#[derive(Debug, Clone, Error)]
#[error("{address} returned status {status}: {message}")]
pub struct InvokeError {
    pub address: PartitionAddress,
    pub status: u16,
    pub message: String,
}

/// The caller's own commit failed.
///
/// `legs` lists the remote effects that had already committed on other
/// partitions before the failure; they are not rolled back by the store.
#[derive(Debug, Error)]
#[error("commit on {address} failed: {error}")]
pub struct CommitFailure {
    pub address: PartitionAddress,
    #[source]
    pub error: StoreError,
    pub legs: Vec<RemoteLeg>,
}

// ---------------------------------------------------------------------------
// Remote legs
// ---------------------------------------------------------------------------

/// A committed, mutating effect of a cross-partition call.
///
/// `leg_id` is the callee transaction's id, which the callee may use as a
/// key for whatever it needs to undo the effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLeg {
    pub address: PartitionAddress,
    pub operation: String,
    pub leg_id: String,
    pub version: Version,
}

// ---------------------------------------------------------------------------
// Transaction context
// ---------------------------------------------------------------------------

/// Everything an operation sees while it runs: the buffered transaction,
/// its id and timestamp, the partition it runs on, and the legs it has
/// committed elsewhere.
#[derive(Debug)]
pub struct TxContext {
    tx: Transaction,
    tx_id: String,
    address: PartitionAddress,
    timestamp: DateTime<Utc>,
    legs: Vec<RemoteLeg>,
}

impl TxContext {
    fn new(store: Arc<dyn VersionedStore>, address: PartitionAddress, timestamp: DateTime<Utc>) -> Self {
        Self {
            tx: Transaction::begin(store),
            tx_id: Uuid::new_v4().to_string(),
            address,
            timestamp,
            legs: Vec::new(),
        }
    }

    /// Overrides the transaction timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    pub fn address(&self) -> &PartitionAddress {
        &self.address
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Remote legs committed by this transaction so far.
    pub fn legs(&self) -> &[RemoteLeg] {
        &self.legs
    }

    /// Takes the leg journal, leaving it empty.
    pub fn take_legs(&mut self) -> Vec<RemoteLeg> {
        std::mem::take(&mut self.legs)
    }

    pub fn get(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.tx.get(key)
    }

    pub fn put(&mut self, key: &str, value: Vec<u8>) {
        self.tx.put(key, value);
    }

    pub fn range_scan(&mut self, low: &str, high: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        self.tx.range_scan(low, high)
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// One contract's key space and the store it lives on.
#[derive(Debug, Clone)]
pub struct Partition {
    address: PartitionAddress,
    store: Arc<dyn VersionedStore>,
}

impl Partition {
    pub fn new(address: PartitionAddress, store: Arc<dyn VersionedStore>) -> Self {
        Self { address, store }
    }

    pub fn address(&self) -> &PartitionAddress {
        &self.address
    }

    pub fn store(&self) -> &Arc<dyn VersionedStore> {
        &self.store
    }

    /// Opens a fresh transaction stamped with the current time.
    pub fn begin(&self) -> TxContext {
        TxContext::new(Arc::clone(&self.store), self.address.clone(), Utc::now())
    }

    /// Commits `ctx`. On failure the already-committed remote legs are
    /// returned alongside the store error.
    pub fn commit(&self, mut ctx: TxContext) -> Result<Version, CommitFailure> {
        let tx_id = ctx.tx_id.clone();
        let legs = ctx.take_legs();
        match ctx.tx.commit() {
            Ok(version) => {
                tracing::debug!(partition = %self.address, tx_id = %tx_id, version, "transaction committed");
                Ok(version)
            }
            Err(error) => {
                tracing::warn!(
                    partition = %self.address,
                    tx_id = %tx_id,
                    error = %error,
                    stranded_legs = legs.len(),
                    "transaction commit failed"
                );
                Err(CommitFailure {
                    address: self.address.clone(),
                    error,
                    legs,
                })
            }
        }
    }

    /// Runs read-only logic in a transaction that is never committed.
    pub fn query<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TxContext) -> Result<T, E>,
    {
        let mut ctx = self.begin();
        f(&mut ctx)
    }

    /// Runs `f` as an independent transaction on this partition on behalf of
    /// `caller`, and commits it before returning.
    ///
    /// The callee inherits the caller's timestamp. A successful call that
    /// wrote anything is recorded as a [`RemoteLeg`] in `caller`.
    pub fn invoke<T, E, F>(&self, caller: &mut TxContext, operation: &str, f: F) -> Result<T, InvokeError>
    where
        E: fmt::Display,
        F: FnOnce(&mut TxContext) -> Result<T, E>,
    {
        let mut callee = TxContext::new(Arc::clone(&self.store), self.address.clone(), caller.timestamp);
        let leg_id = callee.tx_id.clone();

        // Anything the callee committed further downstream is durable no
        // matter how this call ends.
        let result = f(&mut callee);
        caller.legs.extend(callee.take_legs());

        let output = result.map_err(|e| InvokeError {
            address: self.address.clone(),
            status: STATUS_ERROR,
            message: e.to_string(),
        })?;

        let mutating = callee.tx.has_writes();
        let version = self.commit(callee).map_err(|failure| InvokeError {
            address: self.address.clone(),
            status: STATUS_CONFLICT,
            message: failure.error.to_string(),
        })?;

        if mutating {
            caller.legs.push(RemoteLeg {
                address: self.address.clone(),
                operation: operation.to_string(),
                leg_id,
                version,
            });
        }

        tracing::debug!(
            caller = %caller.address,
            callee = %self.address,
            operation,
            mutating,
            "cross-partition call committed"
        );
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
