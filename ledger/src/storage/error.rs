// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Error types for the versioned partition store.

use thiserror::Error;

/// Why a transaction lost its commit-time validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A key read by the transaction was rewritten by a later commit.
    ReadVersion,
    /// A range scanned by the transaction now yields a different key set
    /// or a different version for one of its keys.
    Phantom,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::ReadVersion => write!(f, "read version"),
            ConflictKind::Phantom => write!(f, "phantom read"),
        }
    }
}

/// Errors that can occur while reading from or committing to a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Commit-time MVCC validation failed. None of the transaction's writes
    /// landed; the caller has to resubmit.
    #[error("mvcc {kind} conflict on key {key:?}")]
    Conflict {
        /// The key (or range start) whose validation failed.
        key: String,
        /// Which check failed.
        kind: ConflictKind,
    },

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns `true` if this is a commit-time conflict the caller may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
