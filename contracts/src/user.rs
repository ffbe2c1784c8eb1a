// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Account Ledger (user tier)
//!
//! End-user accounts, each capped at a fixed ceiling. Value arrives from
//! the bank tier through [`UserLedger::credit`]; users pay each other with
//! [`UserLedger::transfer_between_users`], which first confirms with the
//! bank partition that the named bank is registered.
//!
//! ## Known limitation
//!
//! A user-to-user transfer persists only the sender's debit. The receiver's
//! balance is checked against the ceiling but never written, so the value
//! leaves circulation. This is the behaviour the network has always had and
//! is kept as is; `Network::audit_conservation` makes the gap visible.

use std::sync::Arc;

use cbdc_ledger::config::STATUS_ERROR;
use cbdc_ledger::TxContext;

use crate::config::UserConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::history::HistoryLog;
use crate::model::{self, Account, CreditLeg, TransferRecord};
use crate::remote::BankDirectory;

#[derive(Debug)]
pub struct UserLedger {
    config: UserConfig,
    banks: Arc<dyn BankDirectory>,
}

impl UserLedger {
    pub fn new(config: UserConfig, banks: Arc<dyn BankDirectory>) -> Self {
        Self { config, banks }
    }

    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    /// Creates every seed account with zero balance.
    pub fn initialize(&self, ctx: &mut TxContext) -> LedgerResult<()> {
        for seed in &self.config.accounts {
            if ctx.get(&seed.id)?.is_some() {
                return Err(LedgerError::AlreadyInitialized(seed.id.clone()));
            }
        }
        for seed in &self.config.accounts {
            model::save(ctx, &seed.id, &Account::new(&seed.id, &seed.name))?;
        }
        tracing::info!(partition = %ctx.address(), accounts = self.config.accounts.len(), "user accounts initialized");
        Ok(())
    }

    pub fn read_account(&self, ctx: &mut TxContext, id: &str) -> LedgerResult<Account> {
        model::load_required(ctx, id)
    }

    fn check_ceiling(&self, id: &str, new_balance: i64) -> LedgerResult<()> {
        if new_balance > self.config.ceiling {
            return Err(LedgerError::CeilingExceeded {
                account: id.to_string(),
                attempted: new_balance,
                ceiling: self.config.ceiling,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transfers
    // -----------------------------------------------------------------------

    /// Credits `id` with `amount` paid out by `bank_id`.
    ///
    /// Also writes a [`CreditLeg`] under this transaction's id so the credit
    /// can be reversed if the paying bank's own transaction fails.
    pub fn credit(&self, ctx: &mut TxContext, bank_id: &str, id: &str, amount: &str) -> LedgerResult<Account> {
        let mut account = self.read_account(ctx, id)?;
        let amount = model::parse_amount(amount)?;
        let new_balance = model::add(account.balance, amount)?;
        self.check_ceiling(id, new_balance)?;

        account.balance = new_balance;
        model::save(ctx, id, &account)?;
        let leg = CreditLeg {
            id: ctx.tx_id().to_string(),
            account: id.to_string(),
            counterparty: bank_id.to_string(),
            amount,
            reversed: false,
        };
        model::save(ctx, &CreditLeg::key(&leg.id), &leg)?;
        HistoryLog::append(ctx, bank_id, id, amount)?;

        tracing::info!(partition = %ctx.address(), bank_id, account = id, amount, balance = new_balance, "user credited");
        Ok(account)
    }

    /// Adds value to `id` under the user ceiling, with no credit leg and no
    /// history record. `bank_id` names the bank the value came from.
    pub fn credit_any(&self, ctx: &mut TxContext, bank_id: &str, id: &str, amount: &str) -> LedgerResult<()> {
        let mut account = self.read_account(ctx, id)?;
        let amount = model::parse_amount(amount)?;
        let new_balance = model::add(account.balance, amount)?;
        self.check_ceiling(id, new_balance)?;

        account.balance = new_balance;
        model::save(ctx, id, &account)?;

        tracing::info!(partition = %ctx.address(), bank_id, account = id, amount, balance = new_balance, "user balance updated");
        Ok(())
    }

    /// Pays `amount` from `sender` to `receiver` through `bank_id`.
    ///
    /// Only the sender's debit is persisted; see the module docs.
    pub fn transfer_between_users(
        &self,
        ctx: &mut TxContext,
        bank_id: &str,
        sender: &str,
        receiver: &str,
        amount: i64,
    ) -> LedgerResult<()> {
        let mut from = self.read_account(ctx, sender)?;
        let to = self.read_account(ctx, receiver)?;
        model::check_amount(amount)?;

        let remaining = model::debit(&from, amount)?;
        let receiver_balance = model::add(to.balance, amount)?;
        self.check_ceiling(receiver, receiver_balance)?;

        if !self.banks.account_exists(ctx, bank_id)? {
            return Err(LedgerError::RemoteCallFailed {
                partition: self.banks.address().clone(),
                status: STATUS_ERROR,
                message: format!("bank {bank_id} is not registered"),
            });
        }

        HistoryLog::append(ctx, sender, receiver, amount)?;
        from.balance = remaining;
        model::save(ctx, sender, &from)?;

        tracing::info!(partition = %ctx.address(), bank_id, sender, receiver, amount, "user transfer recorded");
        Ok(())
    }

    /// Undoes the credit written by transaction `leg_id`.
    ///
    /// Missing or already reversed legs are a no-op, so compensation can be
    /// retried safely.
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

/// Reverses a credit leg in whichever partition `ctx` runs on. Shared by
/// the bank and user tiers, which record credits the same way.
pub(crate) fn reverse_leg(ctx: &mut TxContext, leg_id: &str) -> LedgerResult<()> {
    let key = CreditLeg::key(leg_id);
    let Some(mut leg) = model::load::<CreditLeg>(ctx, &key)? else {
        tracing::debug!(partition = %ctx.address(), leg_id, "no credit leg to reverse");
        return Ok(());
    };
    if leg.reversed {
        tracing::debug!(partition = %ctx.address(), leg_id, "credit leg already reversed");
        return Ok(());
    }

    let mut account: Account = model::load_required(ctx, &leg.account)?;
    account.balance = model::debit(&account, leg.amount)?;
    model::save(ctx, &leg.account, &account)?;
    HistoryLog::append(ctx, &leg.account, &leg.counterparty, leg.amount)?;

    leg.reversed = true;
    model::save(ctx, &key, &leg)?;

    tracing::warn!(
        partition = %ctx.address(),
        leg_id,
        account = %leg.account,
        amount = leg.amount,
        "credit reversed"
    );
    Ok(())
}
