// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CBDC Ledger — Platform Layer
//!
//! The ground the tiered CBDC contracts stand on: a versioned key-value
//! store with optimistic concurrency, transactions over it, and the
//! partition abstraction through which one contract calls another.
//!
//! ## Architecture
//!
//! - **storage** — `VersionedStore` trait, read/write sets, commit-time MVCC
//!   validation, in-memory and sled backends.
//! - **invoke** — partitions, transaction contexts, and cross-partition
//!   invocation that commits independently of the caller.
//! - **config** — status codes, timestamp format, store backend selection.
//! - **logging** — `tracing-subscriber` setup.
//!
//! ## Guarantees
//!
//! 1. Writes inside one transaction on one partition land together or not
//!    at all.
//! 2. A transaction whose reads went stale is rejected at commit with
//!    [`storage::StoreError::Conflict`]; nothing retries automatically.
//! 3. Cross-partition calls are *not* atomic with their caller. The caller
//!    learns which remote effects committed, and that is all.

pub mod config;
pub mod invoke;
pub mod logging;
pub mod storage;

pub use invoke::{CommitFailure, InvokeError, Partition, PartitionAddress, RemoteLeg, TxContext};
pub use storage::{MemoryStore, SledStore, StoreError, StoreResult, VersionedStore};
