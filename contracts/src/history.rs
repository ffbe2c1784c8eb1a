// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # History Log
//!
//! Append-only transfer records, one log per partition. Records live at
//! decimal keys `"1"`, `"2"`, ... next to the accounts, and the last id
//! handed out is kept in a counter at [`HISTORY_SEQ_KEY`].
//!
//! The counter is read and written by the same transaction that writes the
//! record. Two transactions appending concurrently on one partition both
//! read the same counter version, so the second to commit fails MVCC
//! validation: committed ids are unique and strictly increasing.

use cbdc_ledger::config::TIMESTAMP_FORMAT;
use cbdc_ledger::TxContext;

use crate::error::{LedgerError, LedgerResult};
use crate::model::{self, TransferRecord};

/// Counter holding the last history id handed out.
pub const HISTORY_SEQ_KEY: &str = "~history/seq";

/// Stateless handle over the history records of whatever partition a
/// [`TxContext`] runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryLog;

impl HistoryLog {
    /// The id the next appended record will get.
    pub fn next_id(ctx: &mut TxContext) -> LedgerResult<u64> {
        Ok(Self::last_id(ctx)? + 1)
    }

    /// Appends `{sender -> receiver, amount}` stamped with the transaction
    /// timestamp.
    pub fn append(ctx: &mut TxContext, sender: &str, receiver: &str, amount: i64) -> LedgerResult<TransferRecord> {
        let id = Self::next_id(ctx)?;
        let record = TransferRecord {
            id: id.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount: amount.to_string(),
            timestamp: ctx.timestamp().format(TIMESTAMP_FORMAT).to_string(),
        };
        model::save(ctx, &record.id, &record)?;
        model::save(ctx, HISTORY_SEQ_KEY, &id)?;

        tracing::debug!(
            partition = %ctx.address(),
            id,
            sender,
            receiver,
            amount,
            "history record appended"
        );
        Ok(record)
    }

    /// Every record, ordered by id.
    pub fn list_all(ctx: &mut TxContext) -> LedgerResult<Vec<TransferRecord>> {
        let last = Self::last_id(ctx)?;
        let mut records = Vec::new();
        for id in 1..=last {
            let key = id.to_string();
            // Ids are dense; a hole means the log was tampered with.
            let record: TransferRecord = model::load(ctx, &key)?
                .ok_or_else(|| LedgerError::decode(&key, "history record missing"))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Records where `id` is the sender or the receiver.
    pub fn list_for_participant(ctx: &mut TxContext, id: &str) -> LedgerResult<Vec<TransferRecord>> {
        Ok(Self::list_all(ctx)?
            .into_iter()
            .filter(|r| r.involves(id))
            .collect())
    }

    fn last_id(ctx: &mut TxContext) -> LedgerResult<u64> {
        Ok(model::load::<u64>(ctx, HISTORY_SEQ_KEY)?.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cbdc_ledger::{MemoryStore, Partition, PartitionAddress};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn partition() -> Partition {
        Partition::new(
            PartitionAddress::new("userchaincode", "user-channel"),
            Arc::new(MemoryStore::new()),
        )
    }

    fn append(p: &Partition, sender: &str, receiver: &str, amount: i64) -> TransferRecord {
        let mut ctx = p.begin();
        let record = HistoryLog::append(&mut ctx, sender, receiver, amount).unwrap();
        p.commit(ctx).unwrap();
        record
    }

    #[test]
    fn empty_log() {
        let p = partition();
        let mut ctx = p.begin();
        assert!(HistoryLog::list_all(&mut ctx).unwrap().is_empty());
        assert_eq!(HistoryLog::next_id(&mut ctx).unwrap(), 1);
    }

    #[test]
    fn ids_are_sequential() {
        let p = partition();
        assert_eq!(append(&p, "User0", "User1", 10).id, "1");
        assert_eq!(append(&p, "User1", "User2", 5).id, "2");
        assert_eq!(append(&p, "User2", "User0", 1).id, "3");

        let mut ctx = p.begin();
        let ids: Vec<String> = HistoryLog::list_all(&mut ctx)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn two_appends_in_one_transaction() {
        let p = partition();
        let mut ctx = p.begin();
        HistoryLog::append(&mut ctx, "a", "b", 1).unwrap();
        let second = HistoryLog::append(&mut ctx, "b", "c", 2).unwrap();
        p.commit(ctx).unwrap();
        assert_eq!(second.id, "2");
    }

    #[test]
    fn listing_goes_past_three_digit_ids() {
        let p = partition();
        let mut ctx = p.begin();
        for _ in 0..1001 {
            HistoryLog::append(&mut ctx, "korea", "korea", 1).unwrap();
        }
        p.commit(ctx).unwrap();

        let mut ctx = p.begin();
        let all = HistoryLog::list_all(&mut ctx).unwrap();
        assert_eq!(all.len(), 1001);
        assert_eq!(all.last().unwrap().id, "1001");
    }

    #[test]
    fn concurrent_appends_conflict() {
        let p = partition();
        let mut first = p.begin();
        let mut second = p.begin();
        HistoryLog::append(&mut first, "User0", "User1", 1).unwrap();
        HistoryLog::append(&mut second, "User1", "User0", 2).unwrap();

        p.commit(first).unwrap();
        let failure = p.commit(second).unwrap_err();
        assert!(failure.error.is_conflict());

        let mut ctx = p.begin();
        assert_eq!(HistoryLog::list_all(&mut ctx).unwrap().len(), 1);
    }

    #[test]
    fn participant_filter_matches_either_side() {
        let p = partition();
        append(&p, "User0", "User1", 10);
        append(&p, "User2", "User0", 5);
        append(&p, "User1", "User2", 1);

        let mut ctx = p.begin();
        let records = HistoryLog::list_for_participant(&mut ctx, "User0").unwrap();
        assert_eq!(records.len(), 2);
        assert!(HistoryLog::list_for_participant(&mut ctx, "nobody").unwrap().is_empty());
    }

    #[test]
    fn timestamp_has_minute_resolution() {
        let p = partition();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 14, 7, 59).unwrap();
        let mut ctx = p.begin().with_timestamp(at);
        let record = HistoryLog::append(&mut ctx, "korea", "Bank0", 200).unwrap();
        assert_eq!(record.timestamp, "2026-03-01 14:07");
    }

    #[test]
    fn malformed_record_is_a_decode_error() {
        let p = partition();
        append(&p, "a", "b", 1);
        let mut ctx = p.begin();
        ctx.put("1", b"not json".to_vec());
        p.commit(ctx).unwrap();

        let mut ctx = p.begin();
        assert!(matches!(
            HistoryLog::list_all(&mut ctx),
            Err(LedgerError::Decode { .. })
        ));
    }

    #[test]
    fn inflated_counter_reports_the_first_missing_record() {
        let p = partition();
        append(&p, "a", "b", 1);
        let mut ctx = p.begin();
        model::save(&mut ctx, HISTORY_SEQ_KEY, &u64::MAX).unwrap();
        p.commit(ctx).unwrap();

        let mut ctx = p.begin();
        match HistoryLog::list_all(&mut ctx) {
            Err(LedgerError::Decode { key, .. }) => assert_eq!(key, "2"),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }
}
