// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Network Orchestration
//!
//! [`Network`] wires the three partitions together from a
//! [`NetworkConfig`] and is the entry point applications submit operations
//! through.
//!
//! ## Submission
//!
//! Every submitting method runs one operation as one transaction on the
//! partition it belongs to: begin, run, commit. Nothing is retried; a
//! [`LedgerError::is_conflict`] error means the caller may resubmit.
//!
//! ## Compensation
//!
//! Operations that cross a partition boundary leave behind remote legs
//! that already committed. When the operation then fails, either in its own
//! logic or at commit, each leg is reversed through the callee's
//! `reverse_credit`, newest first, in a transaction of its own:
//!
//! ```text
//! central.transfer_to_bank ── bank.credit (committed, leg L1)
//!        │
//!        └── commit ✗ conflict ──▶ bank.reverse_credit(L1) ──▶ original error
//! ```
//!
//! If a reversal cannot be applied (typically because the credited funds
//! were already spent) the caller gets [`LedgerError::CompensationFailed`]
//! naming the leg, and the books need reconciling by hand.
//! [`Network::audit_conservation`] is the out-of-band check for that.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use cbdc_ledger::config::StoreConfig;
use cbdc_ledger::storage::open_partitions;
use cbdc_ledger::{Partition, RemoteLeg, TxContext, VersionedStore};
use serde::{Deserialize, Serialize};

use crate::bank::BankLedger;
use crate::central::CentralLedger;
use crate::config::{ConfigError, NetworkConfig, COMPENSATION_ATTEMPTS};
use crate::error::{LedgerError, LedgerResult};
use crate::model::{Account, AggregateBalance, TransferRecord};
use crate::remote::{BankEndpoint, BankRegistry, UserEndpoint};
use crate::user::UserLedger;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One of the three partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Central,
    Bank,
    User,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Central => write!(f, "central"),
            Tier::Bank => write!(f, "bank"),
            Tier::User => write!(f, "user"),
        }
    }
}

/// Result of [`Network::audit_conservation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Value that has left the central partition (`total_issued - balance`).
    pub handed_out: i64,
    /// Sum of all configured bank balances.
    pub bank_total: i64,
    /// Sum of all configured user balances.
    pub user_total: i64,
    /// `handed_out - (bank_total + user_total)`. Positive means value went
    /// missing below the central tier; negative means it was created there.
    pub discrepancy: i64,
}

impl ConservationReport {
    pub fn is_balanced(&self) -> bool {
        self.discrepancy == 0
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// The three ledgers, their partitions, and the submission path.
#[derive(Debug)]
pub struct Network {
    config: NetworkConfig,
    central_partition: Partition,
    bank_partition: Partition,
    user_partition: Partition,
    central: Arc<CentralLedger>,
    bank: Arc<BankLedger>,
    user: Arc<UserLedger>,
}

impl Network {
    /// Validates `config` and opens the partitions on its store backend.
    pub fn new(config: NetworkConfig) -> LedgerResult<Self> {
        config.validate()?;
        let names = [
            config.central.partition.to_string(),
            config.bank.partition.to_string(),
            config.user.partition.to_string(),
        ];
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let mut stores = open_partitions(&config.store, &names)?.into_iter();
        match (stores.next(), stores.next(), stores.next()) {
            (Some(central), Some(bank), Some(user)) => Ok(Self::with_stores(config, central, bank, user)),
            _ => Err(ConfigError::Invalid("store backend opened too few partitions".into()).into()),
        }
    }

    /// A network whose partitions live in memory, whatever `config.store`
    /// says.
    pub fn in_memory(mut config: NetworkConfig) -> LedgerResult<Self> {
        config.store = StoreConfig::Memory;
        Self::new(config)
    }

    /// A network persisted in a sled database at `path`.
    pub fn open<P: AsRef<Path>>(mut config: NetworkConfig, path: P) -> LedgerResult<Self> {
        config.store = StoreConfig::Sled {
            path: path.as_ref().to_path_buf(),
        };
        Self::new(config)
    }

    /// Builds the network over stores the caller already opened. `config`
    /// is taken as valid.
    pub fn with_stores(
        config: NetworkConfig,
        central_store: Arc<dyn VersionedStore>,
        bank_store: Arc<dyn VersionedStore>,
        user_store: Arc<dyn VersionedStore>,
    ) -> Self {
        let central_partition = Partition::new(config.central.partition.clone(), central_store);
        let bank_partition = Partition::new(config.bank.partition.clone(), bank_store);
        let user_partition = Partition::new(config.user.partition.clone(), user_store);

        let registry = Arc::new(BankRegistry::new(bank_partition.clone()));
        let user = Arc::new(UserLedger::new(config.user.clone(), registry));
        let user_endpoint = Arc::new(UserEndpoint::new(user_partition.clone(), Arc::clone(&user)));
        let bank = Arc::new(BankLedger::new(config.bank.clone(), user_endpoint));
        let bank_endpoint = Arc::new(BankEndpoint::new(bank_partition.clone(), Arc::clone(&bank)));
        let central = Arc::new(CentralLedger::new(config.central.clone(), bank_endpoint));

        tracing::info!(
            central = %central_partition.address(),
            bank = %bank_partition.address(),
            user = %user_partition.address(),
            "network assembled"
        );

        Self {
            config,
            central_partition,
            bank_partition,
            user_partition,
            central,
            bank,
            user,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn partition(&self, tier: Tier) -> &Partition {
        match tier {
            Tier::Central => &self.central_partition,
            Tier::Bank => &self.bank_partition,
            Tier::User => &self.user_partition,
        }
    }

    pub fn central(&self) -> &Arc<CentralLedger> {
        &self.central
    }

    pub fn bank(&self) -> &Arc<BankLedger> {
        &self.bank
    }

    pub fn user(&self) -> &Arc<UserLedger> {
        &self.user
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Seeds all three partitions.
    pub fn initialize(&self) -> LedgerResult<()> {
        self.submit(Tier::Central, "initialize", |ctx| self.central.initialize(ctx))?;
        self.submit(Tier::Bank, "initialize", |ctx| self.bank.initialize(ctx))?;
        self.submit(Tier::User, "initialize", |ctx| self.user.initialize(ctx))?;
        Ok(())
    }

    pub fn mint(&self, amount: i64) -> LedgerResult<AggregateBalance> {
        self.submit(Tier::Central, "mint", |ctx| self.central.mint(ctx, amount))
    }

    pub fn transfer_to_bank(&self, bank_id: &str, amount: &str) -> LedgerResult<()> {
        self.submit(Tier::Central, "transfer_to_bank", |ctx| {
            self.central.transfer_to_bank(ctx, bank_id, amount)
        })
    }

    pub fn bank_credit(&self, id: &str, amount: &str) -> LedgerResult<Account> {
        self.submit(Tier::Bank, "credit", |ctx| self.bank.credit(ctx, id, amount))
    }

    pub fn bank_credit_any(&self, id: &str, user_id: &str, amount: &str) -> LedgerResult<()> {
        self.submit(Tier::Bank, "credit_any", |ctx| self.bank.credit_any(ctx, id, user_id, amount))
    }

    pub fn transfer_between_banks(&self, sender: &str, receiver: &str, amount: &str) -> LedgerResult<()> {
        self.submit(Tier::Bank, "transfer_between_banks", |ctx| {
            self.bank.transfer_between_banks(ctx, sender, receiver, amount)
        })
    }

    pub fn debit_and_forward_to_user(&self, bank_id: &str, user_id: &str, amount: &str) -> LedgerResult<()> {
        self.submit(Tier::Bank, "debit_and_forward_to_user", |ctx| {
            self.bank.debit_and_forward_to_user(ctx, bank_id, user_id, amount)
        })
    }

    pub fn user_credit(&self, bank_id: &str, id: &str, amount: &str) -> LedgerResult<Account> {
        self.submit(Tier::User, "credit", |ctx| self.user.credit(ctx, bank_id, id, amount))
    }

    pub fn user_credit_any(&self, bank_id: &str, id: &str, amount: &str) -> LedgerResult<()> {
        self.submit(Tier::User, "credit_any", |ctx| self.user.credit_any(ctx, bank_id, id, amount))
    }

    pub fn transfer_between_users(&self, bank_id: &str, sender: &str, receiver: &str, amount: i64) -> LedgerResult<()> {
        self.submit(Tier::User, "transfer_between_users", |ctx| {
            self.user.transfer_between_users(ctx, bank_id, sender, receiver, amount)
        })
    }

    /// Reverses one committed remote leg. Used by the saga path and
    /// available for manual reconciliation of a leg reported by
    /// [`LedgerError::CompensationFailed`].
    pub fn compensate(&self, leg: &RemoteLeg) -> LedgerResult<()> {
        let tier = if leg.address == *self.bank_partition.address() {
            Tier::Bank
        } else if leg.address == *self.user_partition.address() {
            Tier::User
        } else {
            return Err(LedgerError::NotFound(format!("no compensable partition {}", leg.address)));
        };

        let mut attempt = 1;
        loop {
            let result = self.run_once(tier, |ctx| match tier {
                Tier::Bank => self.bank.reverse_credit(ctx, &leg.leg_id),
                _ => self.user.reverse_credit(ctx, &leg.leg_id),
            });
            match result {
                Err(e) if e.is_conflict() && attempt < COMPENSATION_ATTEMPTS => {
                    tracing::debug!(leg_id = %leg.leg_id, attempt, "compensation conflicted, resubmitting");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Runs `f` in one transaction on `tier` and compensates whatever
    /// remote legs it stranded if it fails.
    fn submit<T, F>(&self, tier: Tier, operation: &str, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut TxContext) -> LedgerResult<T>,
    {
        let partition = self.partition(tier);
        let mut ctx = partition.begin();
        let tx_id = ctx.tx_id().to_string();

        let (cause, legs) = match f(&mut ctx) {
            Ok(output) => match partition.commit(ctx) {
                Ok(version) => {
                    tracing::debug!(%tier, operation, tx_id = %tx_id, version, "operation committed");
                    return Ok(output);
                }
                Err(failure) => (LedgerError::Store(failure.error), failure.legs),
            },
            Err(err) => (err, ctx.take_legs()),
        };

        tracing::warn!(%tier, operation, tx_id = %tx_id, error = %cause, stranded_legs = legs.len(), "operation failed");
        Err(self.unwind(legs, cause))
    }

    /// Plain begin-run-commit with no compensation.
    fn run_once<T, F>(&self, tier: Tier, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut TxContext) -> LedgerResult<T>,
    {
        let partition = self.partition(tier);
        let mut ctx = partition.begin();
        let output = f(&mut ctx)?;
        partition.commit(ctx).map_err(|failure| LedgerError::Store(failure.error))?;
        Ok(output)
    }

    /// Reverses `legs` newest first. Returns `cause` when every reversal
    /// applied, or the first compensation failure otherwise.
    fn unwind(&self, legs: Vec<RemoteLeg>, cause: LedgerError) -> LedgerError {
        for leg in legs.iter().rev() {
            match self.compensate(leg) {
                Ok(()) => {
                    tracing::warn!(leg_id = %leg.leg_id, partition = %leg.address, operation = %leg.operation, "remote leg compensated");
                }
                Err(e) => {
                    tracing::error!(
                        leg_id = %leg.leg_id,
                        partition = %leg.address,
                        error = %e,
                        "compensation failed, manual reconciliation required"
                    );
                    return LedgerError::CompensationFailed {
                        leg: leg.clone(),
                        reason: e.to_string(),
                        cause: Box::new(cause),
                    };
                }
            }
        }
        cause
    }

    /// Flushes all three partition stores.
    pub fn flush(&self) -> LedgerResult<()> {
        for tier in [Tier::Central, Tier::Bank, Tier::User] {
            self.partition(tier).store().flush()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn read_aggregate(&self) -> LedgerResult<AggregateBalance> {
        self.central_partition.query(|ctx| self.central.read_aggregate(ctx))
    }

    pub fn read_bank_view(&self, bank_id: &str) -> LedgerResult<Account> {
        self.central_partition.query(|ctx| self.central.read_bank_view(ctx, bank_id))
    }

    pub fn read_bank_account(&self, id: &str) -> LedgerResult<Account> {
        self.bank_partition.query(|ctx| self.bank.read_account(ctx, id))
    }

    pub fn bank_account_exists(&self, id: &str) -> LedgerResult<bool> {
        self.bank_partition.query(|ctx| BankLedger::account_exists(ctx, id))
    }

    pub fn read_user_account(&self, id: &str) -> LedgerResult<Account> {
        self.user_partition.query(|ctx| self.user.read_account(ctx, id))
    }

    pub fn list_history(&self, tier: Tier) -> LedgerResult<Vec<TransferRecord>> {
        self.partition(tier).query(|ctx| match tier {
            Tier::Central => self.central.list_history(ctx),
            Tier::Bank => self.bank.list_history(ctx),
            Tier::User => self.user.list_history(ctx),
        })
    }

    pub fn list_history_for_participant(&self, tier: Tier, id: &str) -> LedgerResult<Vec<TransferRecord>> {
        self.partition(tier).query(|ctx| match tier {
            Tier::Central => self.central.list_history_for_participant(ctx, id),
            Tier::Bank => self.bank.list_history_for_participant(ctx, id),
            Tier::User => self.user.list_history_for_participant(ctx, id),
        })
    }

    /// Compares what the central tier handed out with what the lower tiers
    /// hold.
    ///
    /// Each partition is read separately, so the report is only exact
    /// while no operation is in flight.
    pub fn audit_conservation(&self) -> LedgerResult<ConservationReport> {
        let handed_out = self.read_aggregate()?.handed_out();
        let bank_total = self.sum_balances(Tier::Bank)?;
        let user_total = self.sum_balances(Tier::User)?;

        let report = ConservationReport {
            handed_out,
            bank_total,
            user_total,
            discrepancy: handed_out - bank_total - user_total,
        };
        if report.is_balanced() {
            tracing::info!(handed_out, bank_total, user_total, "conservation audit balanced");
        } else {
            tracing::warn!(handed_out, bank_total, user_total, discrepancy = report.discrepancy, "conservation audit found a discrepancy");
        }
        Ok(report)
    }

    fn sum_balances(&self, tier: Tier) -> LedgerResult<i64> {
        let seeds = match tier {
            Tier::Bank => &self.config.bank.accounts,
            Tier::User => &self.config.user.accounts,
            Tier::Central => return Ok(0),
        };
        seeds.iter().try_fold(0i64, |total, seed| {
            let balance = match tier {
                Tier::Bank => self.read_bank_account(&seed.id)?.balance,
                _ => self.read_user_account(&seed.id)?.balance,
            };
            total.checked_add(balance).ok_or(LedgerError::AmountOverflow)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        let network = Network::in_memory(NetworkConfig::default()).unwrap();
        network.initialize().unwrap();
        network
    }

    #[test]
    fn initialize_twice_fails_on_central() {
        let network = network();
        assert!(matches!(network.initialize(), Err(LedgerError::AlreadyInitialized(id)) if id == "korea"));
    }

    #[test]
    fn value_flows_down_all_three_tiers() {
        let network = network();
        network.mint(500).unwrap();
        network.transfer_to_bank("Bank0", "200").unwrap();
        network.debit_and_forward_to_user("Bank0", "User0", "150").unwrap();

        assert_eq!(network.read_aggregate().unwrap().balance, 300);
        assert_eq!(network.read_bank_account("Bank0").unwrap().balance, 50);
        assert_eq!(network.read_user_account("User0").unwrap().balance, 150);
        assert_eq!(network.read_bank_view("Bank0").unwrap().balance, 200);
        assert!(network.audit_conservation().unwrap().is_balanced());
    }

    #[test]
    fn each_tier_keeps_its_own_history() {
        let network = network();
        network.mint(500).unwrap();
        network.transfer_to_bank("Bank0", "200").unwrap();
        network.debit_and_forward_to_user("Bank0", "User1", "100").unwrap();

        assert_eq!(network.list_history(Tier::Central).unwrap().len(), 2);
        assert_eq!(network.list_history(Tier::Bank).unwrap().len(), 2);
        let user = network.list_history(Tier::User).unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!((user[0].sender.as_str(), user[0].receiver.as_str()), ("Bank0", "User1"));
        assert_eq!(network.list_history_for_participant(Tier::Bank, "User1").unwrap().len(), 1);
    }

    #[test]
    fn failed_payout_is_not_stranded() {
        let network = network();
        network.mint(2_000).unwrap();
        network.transfer_to_bank("Bank0", "2000").unwrap();
        assert!(matches!(
            network.debit_and_forward_to_user("Bank0", "User0", "1500"),
            Err(LedgerError::RemoteCallFailed { .. })
        ));
        assert_eq!(network.read_bank_account("Bank0").unwrap().balance, 2_000);
        assert_eq!(network.read_user_account("User0").unwrap().balance, 0);
    }

    #[test]
    fn user_transfer_shows_up_in_audit() {
        let network = network();
        network.mint(100).unwrap();
        network.transfer_to_bank("Bank0", "100").unwrap();
        network.debit_and_forward_to_user("Bank0", "User0", "100").unwrap();
        network.transfer_between_users("Bank0", "User0", "User1", 30).unwrap();

        let report = network.audit_conservation().unwrap();
        assert_eq!(report.handed_out, 100);
        assert_eq!(report.user_total, 70);
        assert_eq!(report.discrepancy, 30);
        assert!(!report.is_balanced());
    }

    #[test]
    fn compensating_a_foreign_partition_is_refused() {
        let network = network();
        let leg = RemoteLeg {
            address: network.partition(Tier::Central).address().clone(),
            operation: "mint".into(),
            leg_id: "x".into(),
            version: 1,
        };
        assert!(matches!(network.compensate(&leg), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn tier_display() {
        assert_eq!(Tier::Bank.to_string(), "bank");
    }
}
