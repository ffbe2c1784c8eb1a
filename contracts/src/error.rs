// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Error taxonomy shared by the three ledgers and the network orchestrator.
//!
//! Validation errors are raised before anything is written, so a failed
//! operation leaves its own partition untouched. Whether a cross-partition
//! effect already committed is a separate question, answered by the
//! remote legs on the transaction context.

use cbdc_ledger::{InvokeError, PartitionAddress, RemoteLeg, StoreError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // -- validation --------------------------------------------------------
    /// The debited account would go negative.
    #[error("insufficient funds in {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account being debited.
        account: String,
        /// Its balance before the operation.
        balance: i64,
        /// Amount the operation tried to take.
        requested: i64,
    },

    /// A tier limit would be exceeded.
    #[error("ceiling exceeded for {account}: {attempted} > {ceiling}")]
    CeilingExceeded {
        /// Account (or aggregate) whose limit applies.
        account: String,
        /// Value the operation would have produced.
        attempted: i64,
        /// The configured limit.
        ceiling: i64,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("amount overflow")]
    AmountOverflow,

    #[error("already initialized: {0}")]
    AlreadyInitialized(String),

    // -- lookup and decoding -----------------------------------------------
    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to decode {key}: {reason}")]
    Decode { key: String, reason: String },

    // -- cross-partition and storage ---------------------------------------
    /// The callee answered with a non-success status.
    #[error("remote call to {partition} failed with status {status}: {message}")]
    RemoteCallFailed {
        partition: PartitionAddress,
        status: u16,
        message: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A committed remote leg could not be reversed. It needs manual
    /// reconciliation.
    #[error("compensation of {} on {} failed: {reason} (original error: {cause})", leg.leg_id, leg.address)]
    CompensationFailed {
        leg: RemoteLeg,
        reason: String,
        cause: Box<LedgerError>,
    },
}

impl LedgerError {
    /// True when the operation lost an MVCC race and may be resubmitted.
    pub fn is_conflict(&self) -> bool {
        match self {
            LedgerError::Store(e) => e.is_conflict(),
            _ => false,
        }
    }

    pub(crate) fn decode(key: &str, reason: impl ToString) -> Self {
        LedgerError::Decode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<InvokeError> for LedgerError {
    fn from(e: InvokeError) -> Self {
        LedgerError::RemoteCallFailed {
            partition: e.address,
            status: e.status,
            message: e.message,
        }
    }
}

/// Convenience alias used throughout the contracts.
pub type LedgerResult<T> = Result<T, LedgerError>;
