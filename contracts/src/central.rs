// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Central Authority Ledger (admin tier)
//!
//! Holds the single [`AggregateBalance`] of the currency: how much has ever
//! been issued and how much of it the authority still holds. Issuance is
//! capped; handing value to the bank tier goes through the head office
//! only.
//!
//! After a successful transfer the authority keeps a copy of the bank
//! account exactly as the bank partition returned it, under the bank's id.
//! That copy is a snapshot, not a live view.

use std::sync::Arc;

use cbdc_ledger::TxContext;

use crate::config::CentralConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::history::HistoryLog;
use crate::model::{self, Account, AggregateBalance, TransferRecord};
use crate::remote::BankClient;

#[derive(Debug)]
pub struct CentralLedger {
    config: CentralConfig,
    banks: Arc<dyn BankClient>,
}

impl CentralLedger {
    pub fn new(config: CentralConfig, banks: Arc<dyn BankClient>) -> Self {
        Self { config, banks }
    }

    pub fn config(&self) -> &CentralConfig {
        &self.config
    }

    /// Creates the aggregate record with nothing issued.
    pub fn initialize(&self, ctx: &mut TxContext) -> LedgerResult<()> {
        let id = &self.config.aggregate_id;
        if ctx.get(id)?.is_some() {
            return Err(LedgerError::AlreadyInitialized(id.clone()));
        }
        model::save(ctx, id, &AggregateBalance::new(id))?;
        tracing::info!(partition = %ctx.address(), aggregate = %id, "central authority initialized");
        Ok(())
    }

    pub fn read_aggregate(&self, ctx: &mut TxContext) -> LedgerResult<AggregateBalance> {
        model::load_required(ctx, &self.config.aggregate_id)
    }

    /// Issues `amount` of new value into the authority's own balance.
    pub fn mint(&self, ctx: &mut TxContext, amount: i64) -> LedgerResult<AggregateBalance> {
        let mut aggregate = self.read_aggregate(ctx)?;
        model::check_amount(amount)?;

        let total_issued = model::add(aggregate.total_issued, amount)?;
        if total_issued > self.config.max_issuance {
            return Err(LedgerError::CeilingExceeded {
                account: aggregate.id,
                attempted: total_issued,
                ceiling: self.config.max_issuance,
            });
        }
        aggregate.balance = model::add(aggregate.balance, amount)?;
        aggregate.total_issued = total_issued;

        model::save(ctx, &aggregate.id, &aggregate)?;
        HistoryLog::append(ctx, &aggregate.id, &aggregate.id, amount)?;

        tracing::info!(partition = %ctx.address(), amount, total_issued, balance = aggregate.balance, "value minted");
        Ok(aggregate)
    }

    /// Hands `amount` to the head office bank.
    ///
    /// The bank credit commits on the bank partition before this
    /// transaction does. A failed remote call aborts here with nothing
    /// written.
    pub fn transfer_to_bank(&self, ctx: &mut TxContext, bank_id: &str, amount: &str) -> LedgerResult<()> {
        let mut aggregate = self.read_aggregate(ctx)?;
        let value = model::parse_amount(amount)?;

        let remaining = aggregate.balance - value;
        if remaining < 0 {
            return Err(LedgerError::InsufficientFunds {
                account: aggregate.id,
                balance: aggregate.balance,
                requested: value,
            });
        }
        if bank_id != self.config.head_office {
            return Err(LedgerError::Unauthorized(format!(
                "issued value may only go to the head office {}, not {bank_id}",
                self.config.head_office
            )));
        }
        aggregate.balance = remaining;

        let bank_view = self.banks.credit(ctx, bank_id, amount)?;
        model::save(ctx, bank_id, &bank_view)?;
        HistoryLog::append(ctx, &aggregate.id, bank_id, value)?;
        model::save(ctx, &aggregate.id, &aggregate)?;

        tracing::info!(
            partition = %ctx.address(),
            bank_partition = %self.banks.address(),
            bank_id,
            amount = value,
            balance = aggregate.balance,
            "value transferred to bank tier"
        );
        Ok(())
    }

    /// The last bank account snapshot stored by [`Self::transfer_to_bank`].
    pub fn read_bank_view(&self, ctx: &mut TxContext, bank_id: &str) -> LedgerResult<Account> {
        model::load_required(ctx, bank_id)
    }

    pub fn list_history(&self, ctx: &mut TxContext) -> LedgerResult<Vec<TransferRecord>> {
        HistoryLog::list_all(ctx)
    }

    pub fn list_history_for_participant(&self, ctx: &mut TxContext, id: &str) -> LedgerResult<Vec<TransferRecord>> {
        HistoryLog::list_for_participant(ctx, id)
    }
}
