// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tiered CBDC Contracts
//!
//! The three ledgers of a two-tier central bank digital currency, each on
//! its own partition of the versioned store:
//!
//! - **Central Authority** — issues value under a global ceiling and hands
//!   it to the head office bank.
//! - **Bank** — moves value between banks and pays it out to users.
//! - **User** — end-user accounts under a per-account cap.
//!
//! Calls between partitions go through the typed clients in [`remote`] and
//! commit independently of their caller. [`network::Network`] submits
//! operations, compensates remote legs left behind by failed ones, and
//! audits conservation of value across the tiers.
//!
//! ## Design Principles
//!
//! 1. Every balance change uses checked arithmetic and is validated before
//!    anything is written.
//! 2. Concurrency is optimistic. A transaction that read stale state is
//!    rejected at commit; resubmitting is the caller's decision.
//! 3. Each tier keeps an append-only history of the transfers it saw.

pub mod bank;
pub mod central;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod network;
pub mod remote;
pub mod user;

pub use bank::BankLedger;
pub use central::CentralLedger;
pub use config::NetworkConfig;
pub use error::{LedgerError, LedgerResult};
pub use history::HistoryLog;
pub use model::{Account, AggregateBalance, CreditLeg, TransferRecord};
pub use network::{ConservationReport, Network, Tier};
pub use user::UserLedger;
