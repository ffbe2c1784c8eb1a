// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Persisted Records
//!
//! The JSON shapes every partition stores, plus the helpers that move them
//! in and out of a [`TxContext`]. Field names on the wire are the ones the
//! network has always used (`ID`, `tbalance`, `price`, ...), so existing
//! state stays readable.

use cbdc_ledger::storage::StoreError;
use cbdc_ledger::TxContext;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::RESERVED_KEY_PREFIX;
use crate::error::{LedgerError, LedgerResult};

/// Key prefix of credit-leg bookkeeping records.
pub const LEG_KEY_PREFIX: &str = "~leg/";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A bank or user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub balance: i64,
}

impl Account {
    /// A freshly seeded account with zero balance.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            balance: 0,
        }
    }
}

/// The central authority's singleton issuance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateBalance {
    #[serde(rename = "ID")]
    pub id: String,
    /// Issued value not yet handed to the bank tier.
    pub balance: i64,
    /// Everything ever minted. Never decreases.
    #[serde(rename = "tbalance")]
    pub total_issued: i64,
}

impl AggregateBalance {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            balance: 0,
            total_issued: 0,
        }
    }

    /// Value that has left the central partition.
    pub fn handed_out(&self) -> i64 {
        self.total_issued - self.balance
    }
}

/// One entry of a partition's history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    #[serde(rename = "ID")]
    pub id: String,
    pub sender: String,
    pub receiver: String,
    #[serde(rename = "price")]
    pub amount: String,
    /// Transaction time, `YYYY-MM-DD HH:MM`.
    #[serde(rename = "date")]
    pub timestamp: String,
}

impl TransferRecord {
    /// Whether `id` took part in this transfer on either side.
    pub fn involves(&self, id: &str) -> bool {
        self.sender == id || self.receiver == id
    }
}

/// Bookkeeping written by every credit that can arrive from another
/// partition, keyed by the crediting transaction's id. It is what makes
/// the credit reversible after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLeg {
    pub id: String,
    /// Account that received the value.
    pub account: String,
    /// Where the value came from; it is returned there on reversal.
    pub counterparty: String,
    pub amount: i64,
    pub reversed: bool,
}

impl CreditLeg {
    pub fn key(leg_id: &str) -> String {
        format!("{LEG_KEY_PREFIX}{leg_id}")
    }
}

/// Whether `id` has the shape of an account key. History ids are decimal
/// and bookkeeping keys carry the reserved prefix; neither names an account.
pub fn is_account_key(id: &str) -> bool {
    !id.is_empty() && !id.starts_with(RESERVED_KEY_PREFIX) && !id.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parses a decimal amount argument. Only non-negative integers are money.
pub fn parse_amount(raw: &str) -> LedgerResult<i64> {
    let amount: i64 = raw
        .parse()
        .map_err(|_| LedgerError::InvalidAmount(format!("{raw:?} is not an integer")))?;
    check_amount(amount)?;
    Ok(amount)
}

/// Rejects negative amounts.
pub fn check_amount(amount: i64) -> LedgerResult<()> {
    if amount < 0 {
        return Err(LedgerError::InvalidAmount(format!("{amount} is negative")));
    }
    Ok(())
}

pub(crate) fn add(balance: i64, amount: i64) -> LedgerResult<i64> {
    balance.checked_add(amount).ok_or(LedgerError::AmountOverflow)
}

/// Subtracts `amount` from `account`'s balance, refusing to go negative.
pub(crate) fn debit(account: &Account, amount: i64) -> LedgerResult<i64> {
    match account.balance.checked_sub(amount) {
        Some(remaining) if remaining >= 0 => Ok(remaining),
        Some(_) => Err(LedgerError::InsufficientFunds {
            account: account.id.clone(),
            balance: account.balance,
            requested: amount,
        }),
        None => Err(LedgerError::AmountOverflow),
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Reads and decodes `key`, `None` when absent.
pub(crate) fn load<T: DeserializeOwned>(ctx: &mut TxContext, key: &str) -> LedgerResult<Option<T>> {
    match ctx.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| LedgerError::decode(key, e)),
        None => Ok(None),
    }
}

/// Reads and decodes `key`, `NotFound` when absent.
pub(crate) fn load_required<T: DeserializeOwned>(ctx: &mut TxContext, key: &str) -> LedgerResult<T> {
    load(ctx, key)?.ok_or_else(|| LedgerError::NotFound(key.to_string()))
}

pub(crate) fn save<T: Serialize>(ctx: &mut TxContext, key: &str, value: &T) -> LedgerResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    ctx.put(key, bytes);
    Ok(())
}
