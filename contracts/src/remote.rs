// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Typed Partition Clients
//!
//! Each ledger reaches its neighbour through a narrow trait rather than a
//! string-dispatched call: the central authority only ever credits a bank,
//! a bank only ever credits a user, and the user tier only ever asks
//! whether a bank exists.
//!
//! The endpoints implementing these traits own the target [`Partition`]
//! and run the callee through [`Partition::invoke`], so every call is an
//! independent transaction that has committed by the time it returns.
//!
//! [`BankRegistry`] holds no ledger at all. That keeps the ownership graph
//! acyclic: bank endpoint -> bank ledger -> user endpoint -> user ledger ->
//! bank registry.

use std::fmt;
use std::sync::Arc;

use cbdc_ledger::{InvokeError, Partition, PartitionAddress, TxContext};

use crate::bank::BankLedger;
use crate::model::Account;
use crate::user::UserLedger;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// What the central authority may ask of the bank tier.
pub trait BankClient: Send + Sync + fmt::Debug {
    fn address(&self) -> &PartitionAddress;

    /// Credits newly issued value to `bank_id` and returns the updated
    /// account as the bank tier stored it.
    fn credit(&self, caller: &mut TxContext, bank_id: &str, amount: &str) -> Result<Account, InvokeError>;
}

/// What the user tier may ask of the bank tier.
pub trait BankDirectory: Send + Sync + fmt::Debug {
    fn address(&self) -> &PartitionAddress;

    fn account_exists(&self, caller: &mut TxContext, bank_id: &str) -> Result<bool, InvokeError>;
}

/// What the bank tier may ask of the user tier.
pub trait UserClient: Send + Sync + fmt::Debug {
    fn address(&self) -> &PartitionAddress;

    /// Credits `user_id` with value paid out by `bank_id`.
    fn credit(
        &self,
        caller: &mut TxContext,
        bank_id: &str,
        user_id: &str,
        amount: &str,
    ) -> Result<Account, InvokeError>;
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// The bank partition as seen by the central authority.
#[derive(Debug, Clone)]
pub struct BankEndpoint {
    partition: Partition,
    ledger: Arc<BankLedger>,
}

impl BankEndpoint {
    pub fn new(partition: Partition, ledger: Arc<BankLedger>) -> Self {
        Self { partition, ledger }
    }
}

impl BankClient for BankEndpoint {
    fn address(&self) -> &PartitionAddress {
        self.partition.address()
    }

    fn credit(&self, caller: &mut TxContext, bank_id: &str, amount: &str) -> Result<Account, InvokeError> {
        self.partition
            .invoke(caller, "credit", |ctx| self.ledger.credit(ctx, bank_id, amount))
    }
}

/// Read-only view of the bank partition's account registry.
#[derive(Debug, Clone)]
pub struct BankRegistry {
    partition: Partition,
}

impl BankRegistry {
    pub fn new(partition: Partition) -> Self {
        Self { partition }
    }
}

impl BankDirectory for BankRegistry {
    fn address(&self) -> &PartitionAddress {
        self.partition.address()
    }

    fn account_exists(&self, caller: &mut TxContext, bank_id: &str) -> Result<bool, InvokeError> {
        self.partition
            .invoke(caller, "account_exists", |ctx| BankLedger::account_exists(ctx, bank_id))
    }
}

/// The user partition as seen by the bank tier.
#[derive(Debug, Clone)]
pub struct UserEndpoint {
    partition: Partition,
    ledger: Arc<UserLedger>,
}

impl UserEndpoint {
    pub fn new(partition: Partition, ledger: Arc<UserLedger>) -> Self {
        Self { partition, ledger }
    }
}

impl UserClient for UserEndpoint {
    fn address(&self) -> &PartitionAddress {
        self.partition.address()
    }

    fn credit(
        &self,
        caller: &mut TxContext,
        bank_id: &str,
        user_id: &str,
        amount: &str,
    ) -> Result<Account, InvokeError> {
        self.partition
            .invoke(caller, "credit", |ctx| self.ledger.credit(ctx, bank_id, user_id, amount))
    }
}
