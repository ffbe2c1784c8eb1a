// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bank Ledger (regulatory tier)
//!
//! Intermediary bank accounts. Newly issued value enters the tier only
//! through the head office ([`BankLedger::credit`], called by the central
//! authority). Banks move value among themselves atomically
//! ([`BankLedger::transfer_between_banks`]) and pay it out to users across
//! the partition boundary ([`BankLedger::debit_and_forward_to_user`]).
//!
//! ## Cross-partition payout
//!
//! ```text
//! bank tx:  read bank ─ check funds ─ invoke user.credit ─ write debit ─ commit
//!                                          │
//! user tx:                                 └─ credit ─ commit (durable now)
//! ```
//!
//! The user credit has committed before the bank debit is even written. If
//! the bank transaction then loses an MVCC race, the user keeps the value;
//! the remote leg returned in `CommitFailure` is what lets the network
//! orchestrator reverse it.

use std::sync::Arc;

use cbdc_ledger::TxContext;

use crate::config::BankConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::history::HistoryLog;
use crate::model::{self, Account, CreditLeg, TransferRecord};
use crate::remote::UserClient;
use crate::user::reverse_leg;

#[derive(Debug)]
pub struct BankLedger {
    config: BankConfig,
    users: Arc<dyn UserClient>,
}

impl BankLedger {
    pub fn new(config: BankConfig, users: Arc<dyn UserClient>) -> Self {
        Self { config, users }
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    /// Creates every seed bank with zero balance.
    pub fn initialize(&self, ctx: &mut TxContext) -> LedgerResult<()> {
        for seed in &self.config.accounts {
            if ctx.get(&seed.id)?.is_some() {
                return Err(LedgerError::AlreadyInitialized(seed.id.clone()));
            }
        }
        for seed in &self.config.accounts {
            model::save(ctx, &seed.id, &Account::new(&seed.id, &seed.name))?;
        }
        tracing::info!(partition = %ctx.address(), accounts = self.config.accounts.len(), "bank accounts initialized");
        Ok(())
    }

    pub fn read_account(&self, ctx: &mut TxContext, id: &str) -> LedgerResult<Account> {
        model::load_required(ctx, id)
    }

    /// Whether `id` names a bank account on this partition. History
    /// records and bookkeeping keys are not accounts. Needs no ledger
    /// state, so the user tier can call it without holding a
    /// [`BankLedger`].
    pub fn account_exists(ctx: &mut TxContext, id: &str) -> LedgerResult<bool> {
        if !model::is_account_key(id) {
            return Ok(false);
        }
        Ok(match ctx.get(id)? {
            Some(bytes) => serde_json::from_slice::<Account>(&bytes).is_ok(),
            None => false,
        })
    }

    fn check_ceiling(&self, id: &str, new_balance: i64) -> LedgerResult<()> {
        match self.config.ceiling {
            Some(ceiling) if new_balance > ceiling => Err(LedgerError::CeilingExceeded {
                account: id.to_string(),
                attempted: new_balance,
                ceiling,
            }),
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Credits
    // -----------------------------------------------------------------------

    /// Credits newly issued value to the head office. Called by the central
    /// authority; returns the account as stored.
    pub fn credit(&self, ctx: &mut TxContext, id: &str, amount: &str) -> LedgerResult<Account> {
        if id != self.config.head_office {
            return Err(LedgerError::Unauthorized(format!(
                "only the head office {} may receive issued value, not {id}",
                self.config.head_office
            )));
        }
        let mut account = self.read_account(ctx, id)?;
        let amount = model::parse_amount(amount)?;
        let new_balance = model::add(account.balance, amount)?;
        self.check_ceiling(id, new_balance)?;

        account.balance = new_balance;
        model::save(ctx, id, &account)?;
        let leg = CreditLeg {
            id: ctx.tx_id().to_string(),
            account: id.to_string(),
            counterparty: self.config.authority_name.clone(),
            amount,
            reversed: false,
        };
        model::save(ctx, &CreditLeg::key(&leg.id), &leg)?;
        HistoryLog::append(ctx, &self.config.authority_name, id, amount)?;

        tracing::info!(partition = %ctx.address(), account = id, amount, balance = new_balance, "bank credited by central authority");
        Ok(account)
    }

    /// Adds value to any bank account, with no head-office restriction and
    /// no history record. `user_id` names the user the value came from.
    pub fn credit_any(&self, ctx: &mut TxContext, id: &str, user_id: &str, amount: &str) -> LedgerResult<()> {
        let mut account = self.read_account(ctx, id)?;
        let amount = model::parse_amount(amount)?;
        let new_balance = model::add(account.balance, amount)?;
        self.check_ceiling(id, new_balance)?;

        account.balance = new_balance;
        model::save(ctx, id, &account)?;

        tracing::info!(partition = %ctx.address(), account = id, user_id, amount, balance = new_balance, "bank credited");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Moves `amount` between two banks. Both writes land in this one
    /// transaction, so the transfer is atomic.
    pub fn transfer_between_banks(&self, ctx: &mut TxContext, sender: &str, receiver: &str, amount: &str) -> LedgerResult<()> {
        let mut from = self.read_account(ctx, sender)?;
        let mut to = self.read_account(ctx, receiver)?;
        let amount = model::parse_amount(amount)?;
        if sender == receiver {
            return Err(LedgerError::InvalidTransfer(format!("{sender} cannot transfer to itself")));
        }

        let remaining = model::debit(&from, amount)?;
        let receiver_balance = model::add(to.balance, amount)?;
        self.check_ceiling(receiver, receiver_balance)?;

        from.balance = remaining;
        to.balance = receiver_balance;
        model::save(ctx, sender, &from)?;
        model::save(ctx, receiver, &to)?;
        HistoryLog::append(ctx, sender, receiver, amount)?;

        tracing::info!(partition = %ctx.address(), sender, receiver, amount, "interbank transfer");
        Ok(())
    }

    /// Pays `amount` from `bank_id` out to `user_id` on the user partition.
    ///
    /// The user credit commits on its own before the local debit is
    /// written; a failed remote call leaves this partition untouched.
    pub fn debit_and_forward_to_user(&self, ctx: &mut TxContext, bank_id: &str, user_id: &str, amount: &str) -> LedgerResult<()> {
        let mut bank = self.read_account(ctx, bank_id)?;
        let value = model::parse_amount(amount)?;
        let remaining = model::debit(&bank, value)?;

        self.users.credit(ctx, bank_id, user_id, amount)?;

        bank.balance = remaining;
        model::save(ctx, bank_id, &bank)?;
        HistoryLog::append(ctx, bank_id, user_id, value)?;

        tracing::info!(
            partition = %ctx.address(),
            user_partition = %self.users.address(),
            bank_id,
            user_id,
            amount = value,
            "bank paid out to user"
        );
        Ok(())
    }

    /// Undoes the head-office credit written by transaction `leg_id`.
    /// Idempotent.
    pub fn reverse_credit(&self, ctx: &mut TxContext, leg_id: &str) -> LedgerResult<()> {
        reverse_leg(ctx, leg_id)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    pub fn list_history(&self, ctx: &mut TxContext) -> LedgerResult<Vec<TransferRecord>> {
        HistoryLog::list_all(ctx)
    }

    pub fn list_history_for_participant(&self, ctx: &mut TxContext, id: &str) -> LedgerResult<Vec<TransferRecord>> {
        HistoryLog::list_for_participant(ctx, id)
    }
}
