//! Concurrency and partial-failure tests.
//!
//! Partitions commit independently, so these tests interleave transactions
//! by hand (or from threads) and check what survives: which writes land,
//! which remote legs stay committed, and what the network's compensation
//! puts back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use cbdc_contracts::history::HISTORY_SEQ_KEY;
use cbdc_contracts::{Account, LedgerError, Network, NetworkConfig, Tier};
use cbdc_ledger::storage::{RwSet, Transaction, Version, VersionedValue};
use cbdc_ledger::{MemoryStore, StoreResult, VersionedStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn network() -> Network {
    let network = Network::in_memory(NetworkConfig::default()).expect("network");
    network.initialize().expect("initialize");
    network
}

type Race = Box<dyn FnOnce() -> StoreResult<()> + Send>;

/// Store wrapper that runs a competing action right before the first
/// commit that writes `trigger`, so that commit loses its MVCC race.
#[derive(Debug)]
struct RacingStore {
    inner: Arc<MemoryStore>,
    trigger: &'static str,
    armed: AtomicBool,
    race: parking_lot::Mutex<Option<RaceBox>>,
}

struct RaceBox(Race);

impl std::fmt::Debug for RaceBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RaceBox")
    }
}

impl RacingStore {
    fn new(inner: Arc<MemoryStore>, trigger: &'static str, race: Race) -> Self {
        Self {
            inner,
            trigger,
            armed: AtomicBool::new(true),
            race: parking_lot::Mutex::new(Some(RaceBox(race))),
        }
    }
}

impl VersionedStore for RacingStore {
    fn get(&self, key: &str) -> StoreResult<Option<VersionedValue>> {
        self.inner.get(key)
    }

    fn range(&self, low: &str, high: &str) -> StoreResult<Vec<(String, VersionedValue)>> {
        self.inner.range(low, high)
    }

    fn commit(&self, rwset: &RwSet) -> StoreResult<Version> {
        if rwset.writes.contains_key(self.trigger) && self.armed.swap(false, Ordering::SeqCst) {
            if let Some(RaceBox(race)) = self.race.lock().take() {
                race()?;
            }
        }
        self.inner.commit(rwset)
    }

    fn height(&self) -> StoreResult<Version> {
        self.inner.height()
    }
}

/// Rewrites `key` with its current value, bumping its version.
fn touch(store: Arc<dyn VersionedStore>, key: &str) -> StoreResult<()> {
    let mut tx = Transaction::begin(store);
    if let Some(value) = tx.get(key)? {
        tx.put(key, value);
    }
    tx.commit().map(|_| ())
}

/// Overwrites an account's balance outside of any ledger logic.
fn force_balance(store: Arc<dyn VersionedStore>, id: &str, name: &str, balance: i64) -> StoreResult<()> {
    let mut tx = Transaction::begin(store);
    let account = Account {
        id: id.to_string(),
        name: name.to_string(),
        balance,
    };
    tx.put(id, serde_json::to_vec(&account).expect("encode"));
    tx.commit().map(|_| ())
}

// ---------------------------------------------------------------------------
// History ids
// ---------------------------------------------------------------------------

#[test]
fn concurrent_history_appends_conflict() {
    let network = network();
    let partition = network.partition(Tier::User);
    let user = network.user();

    let mut first = partition.begin();
    let mut second = partition.begin();
    user.credit(&mut first, "Bank0", "User0", "10").unwrap();
    user.credit(&mut second, "Bank0", "User1", "20").unwrap();

    partition.commit(first).unwrap();
    let failure = partition.commit(second).unwrap_err();
    assert!(failure.error.is_conflict());

    // Resubmitting gets the next id.
    network.user_credit("Bank0", "User1", "20").unwrap();
    let ids: Vec<String> = network
        .list_history(Tier::User)
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(network.read_user_account("User1").unwrap().balance, 20);
}

// ---------------------------------------------------------------------------
// Raw contracts: the known limitation
// ---------------------------------------------------------------------------

#[test]
fn raw_remote_credit_survives_caller_conflict() {
    let network = network();
    network.mint(500).unwrap();

    let central_partition = network.partition(Tier::Central);
    let mut ctx = central_partition.begin();
    network.central().transfer_to_bank(&mut ctx, "Bank0", "200").unwrap();
    assert_eq!(ctx.legs().len(), 1);

    // A concurrent mint commits first.
    network.mint(1).unwrap();
    let failure = central_partition.commit(ctx).unwrap_err();
    assert!(failure.error.is_conflict());
    assert_eq!(failure.legs.len(), 1);
    assert_eq!(failure.legs[0].address, *network.partition(Tier::Bank).address());

    // The bank kept the credit; the central balance never went down.
    assert_eq!(network.read_bank_account("Bank0").unwrap().balance, 200);
    assert_eq!(network.read_aggregate().unwrap().balance, 501);
    let report = network.audit_conservation().unwrap();
    assert_eq!(report.discrepancy, -200);

    // The stranded leg can still be compensated by hand.
    network.compensate(&failure.legs[0]).unwrap();
    assert_eq!(network.read_bank_account("Bank0").unwrap().balance, 0);
    assert!(network.audit_conservation().unwrap().is_balanced());
}

// ---------------------------------------------------------------------------
// Network saga
// ---------------------------------------------------------------------------

/// A network whose central partition loses the race on the first commit
/// that writes the Bank0 snapshot, i.e. the first transfer to the bank.
/// `extra` runs inside the race with the bank partition's store.
fn network_with_racing_central<F>(extra: F) -> Network
where
    F: FnOnce(Arc<dyn VersionedStore>) -> StoreResult<()> + Send + 'static,
{
    let central_inner = Arc::new(MemoryStore::new());
    let bank_store: Arc<dyn VersionedStore> = Arc::new(MemoryStore::new());

    let racer: Arc<dyn VersionedStore> = central_inner.clone();
    let racer_bank = Arc::clone(&bank_store);
    let race: Race = Box::new(move || {
        touch(racer, "korea")?;
        extra(racer_bank)
    });
    let central = Arc::new(RacingStore::new(central_inner, "Bank0", race));

    let network = Network::with_stores(
        NetworkConfig::default(),
        central,
        bank_store,
        Arc::new(MemoryStore::new()),
    );
    network.initialize().unwrap();
    network
}

#[test]
fn saga_reverses_bank_credit_when_central_commit_conflicts() {
    let network = network_with_racing_central(|_| Ok(()));
    network.mint(500).unwrap();

    let err = network.transfer_to_bank("Bank0", "200").unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");

    assert_eq!(network.read_aggregate().unwrap().balance, 500);
    assert_eq!(network.read_bank_account("Bank0").unwrap().balance, 0);
    assert!(network.audit_conservation().unwrap().is_balanced());

    // Credit and reversal are both in the bank's history.
    let bank_history = network.list_history(Tier::Bank).unwrap();
    assert_eq!(bank_history.len(), 2);
    assert_eq!(bank_history[1].sender, "Bank0");
    assert_eq!(bank_history[1].receiver, "Central Bank");

    // The race only fires once; resubmitting goes through.
    network.transfer_to_bank("Bank0", "200").unwrap();
    assert_eq!(network.read_aggregate().unwrap().balance, 300);
    assert_eq!(network.read_bank_account("Bank0").unwrap().balance, 200);
    assert!(network.audit_conservation().unwrap().is_balanced());
}

#[test]
fn saga_reports_compensation_failure_when_funds_moved_on() {
    // Bank0 spends the credit before the central commit fails.
    let network = network_with_racing_central(|bank| force_balance(bank, "Bank0", "Shinhan-Main", 0));
    network.mint(500).unwrap();

    let err = network.transfer_to_bank("Bank0", "200").unwrap_err();
    match err {
        LedgerError::CompensationFailed { leg, cause, .. } => {
            assert_eq!(leg.address, *network.partition(Tier::Bank).address());
            assert_eq!(leg.operation, "credit");
            assert!(cause.is_conflict());
        }
        other => panic!("expected a compensation failure, got {other}"),
    }
    assert_eq!(network.read_aggregate().unwrap().balance, 500);
}

#[test]
fn saga_reverses_user_credit_when_bank_commit_conflicts() {
    let bank_inner = Arc::new(MemoryStore::new());
    let racer: Arc<dyn VersionedStore> = bank_inner.clone();
    // Neither initialize nor credit_any writes history, so the first commit
    // touching the sequence counter is the payout.
    let bank = Arc::new(RacingStore::new(
        bank_inner,
        HISTORY_SEQ_KEY,
        Box::new(move || touch(racer, "Bank1")),
    ));
    let network = Network::with_stores(
        NetworkConfig::default(),
        Arc::new(MemoryStore::new()),
        bank,
        Arc::new(MemoryStore::new()),
    );
    network.initialize().unwrap();
    network.bank_credit_any("Bank1", "User0", "300").unwrap();

    let err = network.debit_and_forward_to_user("Bank1", "User0", "100").unwrap_err();
    assert!(err.is_conflict(), "unexpected error: {err}");
    assert_eq!(network.read_bank_account("Bank1").unwrap().balance, 300);
    assert_eq!(network.read_user_account("User0").unwrap().balance, 0);
    assert_eq!(network.list_history(Tier::User).unwrap().len(), 2);

    network.debit_and_forward_to_user("Bank1", "User0", "100").unwrap();
    assert_eq!(network.read_bank_account("Bank1").unwrap().balance, 200);
    assert_eq!(network.read_user_account("User0").unwrap().balance, 100);
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

/// Submits `op` until it stops losing MVCC races.
fn resubmit(op: impl Fn() -> Result<(), LedgerError>) -> Result<(), LedgerError> {
    loop {
        match op() {
            Err(e) if e.is_conflict() => continue,
            other => return other,
        }
    }
}

#[test]
fn concurrent_submissions_keep_invariants() {
    let network = Arc::new(network());
    network.mint(5_000).unwrap();
    network.transfer_to_bank("Bank0", "3000").unwrap();

    let compensation_failures = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let users = ["User0", "User1", "User2"];

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let network = Arc::clone(&network);
            let failures = Arc::clone(&compensation_failures);
            thread::spawn(move || {
                for step in 0..25 {
                    let result = match (worker + step) % 4 {
                        0 => resubmit(|| network.mint(37).map(|_| ())),
                        1 => resubmit(|| network.transfer_to_bank("Bank0", "41")),
                        2 => resubmit(|| network.transfer_between_banks("Bank0", "Bank1", "23")),
                        _ => {
                            let user = users[(worker + step) % users.len()];
                            let bank = if step % 2 == 0 { "Bank0" } else { "Bank1" };
                            resubmit(|| network.debit_and_forward_to_user(bank, user, "29"))
                        }
                    };
                    if let Err(LedgerError::CompensationFailed { .. }) = result {
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let agg = network.read_aggregate().unwrap();
    assert!(agg.total_issued <= 10_000);
    assert!(agg.balance >= 0);
    for bank in ["Bank0", "Bank1"] {
        assert!(network.read_bank_account(bank).unwrap().balance >= 0);
    }
    for user in users {
        let balance = network.read_user_account(user).unwrap().balance;
        assert!((0..=1_000).contains(&balance), "{user} holds {balance}");
    }

    for tier in [Tier::Central, Tier::Bank, Tier::User] {
        let ids: Vec<u64> = network
            .list_history(tier)
            .unwrap()
            .iter()
            .map(|r| r.id.parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[1] == w[0] + 1), "{tier} ids not dense");
    }

    if compensation_failures.load(Ordering::SeqCst) == 0 {
        assert!(network.audit_conservation().unwrap().is_balanced());
    }
}
