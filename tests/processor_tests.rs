//! End-to-end tests for the transaction processor
//!
//! Exercises full operation flows against the in-memory collaborators:
//! fee accounting, clearing-account credits, audit-trail invariants,
//! rate fallback provenance, and concurrent access.

use bank_ledger_engine::rates::QuoteError;
use bank_ledger_engine::{
    Account, AccountId, AccountKind, Currency, InMemoryHistory, InMemoryLedger,
    InMemoryTransactionLog, LedgerError, QuoteSource, RateProvenance, RateProvider, Transaction,
    TransactionKind, TransactionLog, TransactionProcessor,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

const CLEARING: AccountId = 1;

/// Fixed live table: 41 TRY per USD, 45 per EUR
struct FixedSource;

impl QuoteSource for FixedSource {
    fn fetch_rates(&self) -> Result<HashMap<Currency, Decimal>, QuoteError> {
        Ok(HashMap::from([
            (Currency::Try, Decimal::ONE),
            (Currency::Usd, dec!(41)),
            (Currency::Eur, dec!(45)),
            (Currency::Gbp, dec!(52)),
            (Currency::Chf, dec!(46)),
        ]))
    }
}

/// Live source that always fails, forcing the static fallback table
struct DownSource;

impl QuoteSource for DownSource {
    fn fetch_rates(&self) -> Result<HashMap<Currency, Decimal>, QuoteError> {
        Err(QuoteError::Fetch("connection refused".to_string()))
    }
}

struct TestBank {
    ledger: Arc<InMemoryLedger>,
    transactions: Arc<InMemoryTransactionLog>,
    processor: Arc<TransactionProcessor>,
}

impl TestBank {
    fn new(source: Box<dyn QuoteSource>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let ledger = Arc::new(InMemoryLedger::new());
        let transactions = Arc::new(InMemoryTransactionLog::new());
        let history = Arc::new(InMemoryHistory::new());
        let rates = Arc::new(RateProvider::new(source));
        ledger.insert(Account::new(
            CLEARING,
            0,
            "TR00-0001".to_string(),
            AccountKind::Commercial,
            Currency::Try,
        ));
        let processor = Arc::new(TransactionProcessor::new(
            ledger.clone(),
            transactions.clone(),
            history.clone(),
            rates,
        ));
        TestBank {
            ledger,
            transactions,
            processor,
        }
    }

    fn with_live_rates() -> Self {
        Self::new(Box::new(FixedSource))
    }

    fn seed(&self, id: AccountId, currency: Currency, balance: Decimal) {
        let mut account = Account::new(
            id,
            10,
            format!("TR00-{id:04}"),
            AccountKind::Checking,
            currency,
        );
        account.balance = balance;
        self.ledger.insert(account);
    }

    fn balance(&self, id: AccountId) -> Decimal {
        self.ledger.account(id).expect("seeded account").balance
    }

    /// Replay an account's history deltas from zero
    fn replayed_balance(&self, id: AccountId) -> Decimal {
        self.processor
            .balance_history(id)
            .expect("history query")
            .iter()
            .map(|e| e.delta)
            .sum()
    }

    fn transactions_of_kind(&self, kind: TransactionKind) -> Vec<Transaction> {
        self.transactions
            .transactions_in_range(None, None, None)
            .expect("range query")
            .into_iter()
            .filter(|t| t.kind == kind)
            .collect()
    }
}

#[test]
fn deposit_produces_one_history_row_with_matching_delta() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(0));

    let tx = bank.processor.deposit(2, dec!(250), "opening").unwrap();
    assert_eq!(tx.balance_after, dec!(250));
    assert_eq!(bank.balance(2), dec!(250));

    let history = bank.processor.balance_history(2).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].delta, dec!(250));
    assert_eq!(history[0].transaction_id, Some(tx.id));
}

#[test]
fn try_withdraw_scenario() {
    // Account A (TRY, 1000) withdraws 100: fee 0.5, debit 100.5.
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(1000));

    let tx = bank.processor.withdraw(2, dec!(100), "atm").unwrap();
    assert_eq!(tx.fee, dec!(0.5));
    assert_eq!(tx.balance_after, dec!(899.5));
    assert_eq!(bank.balance(2), dec!(899.5));
    assert_eq!(bank.balance(CLEARING), dec!(0.5));

    let all = bank.transactions.transactions_in_range(None, None, None).unwrap();
    assert_eq!(all.len(), 2);
    let fee_rows = bank.transactions_of_kind(TransactionKind::Fee);
    assert_eq!(fee_rows.len(), 1);
    assert_eq!(fee_rows[0].account_id, CLEARING);
    assert_eq!(fee_rows[0].target_account_id, Some(2));
    assert_eq!(fee_rows[0].amount, dec!(0.5));
}

#[test]
fn usd_transfer_scenario() {
    // A (USD, 500) transfers 200 to B (USD, 0): fee 1 USD -> 41 TRY.
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Usd, dec!(500));
    bank.seed(3, Currency::Usd, dec!(0));

    let tx = bank.processor.transfer(2, 3, dec!(200), "invoice").unwrap();
    assert_eq!(tx.fee, dec!(1.0));
    assert_eq!(tx.fee_base, dec!(41.0));
    assert_eq!(bank.balance(2), dec!(299));
    assert_eq!(bank.balance(3), dec!(200));
    assert_eq!(bank.balance(CLEARING), dec!(41.0));

    // The converted fee must be auditable through its snapshot.
    let snapshot_id = tx.rate_snapshot.expect("foreign-fee transfer snapshots");
    let snapshot = bank.processor.rates().snapshot(snapshot_id).unwrap();
    assert_eq!(snapshot.provenance, RateProvenance::Live);
    assert_eq!(snapshot.rates[&Currency::Usd], dec!(41));
}

#[test]
fn failed_withdraw_mutates_nothing_anywhere() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(100));

    let err = bank.processor.withdraw(2, dec!(100), "overdraft").unwrap_err();
    assert_eq!(
        err,
        LedgerError::insufficient_funds(2, dec!(100), dec!(100.5))
    );
    assert_eq!(bank.balance(2), dec!(100));
    assert_eq!(bank.balance(CLEARING), dec!(0));
    assert!(bank.transactions.is_empty());
    assert!(bank.processor.balance_history(2).unwrap().is_empty());
    assert!(bank.processor.balance_history(CLEARING).unwrap().is_empty());
}

#[test]
fn transfer_legs_net_to_zero_and_replay() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(500));
    bank.seed(3, Currency::Try, dec!(100));

    bank.processor.transfer(2, 3, dec!(200), "rent").unwrap();

    // Source, destination, and clearing deltas cancel exactly.
    let deltas: Decimal = [2, 3, CLEARING]
        .iter()
        .flat_map(|id| bank.processor.balance_history(*id).unwrap())
        .map(|e| e.delta)
        .sum();
    assert_eq!(deltas, Decimal::ZERO);

    // Each leg's history replays to the stored post-balance.
    assert_eq!(bank.replayed_balance(CLEARING), bank.balance(CLEARING));
    assert_eq!(bank.balance(2), dec!(299));
    assert_eq!(bank.balance(3), dec!(300));
}

#[test]
fn cross_currency_transfer_rejected_untouched() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Usd, dec!(500));
    bank.seed(3, Currency::Try, dec!(500));

    let err = bank.processor.transfer(2, 3, dec!(100), "wrong").unwrap_err();
    assert_eq!(
        err,
        LedgerError::currency_mismatch(2, Currency::Usd, 3, Currency::Try)
    );
    assert_eq!(bank.balance(2), dec!(500));
    assert_eq!(bank.balance(3), dec!(500));
    assert!(bank.transactions.is_empty());
}

#[test]
fn history_replay_reproduces_balance_across_mixed_operations() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(0));
    bank.seed(3, Currency::Try, dec!(0));

    bank.processor.deposit(2, dec!(1000), "opening").unwrap();
    bank.processor.withdraw(2, dec!(100), "atm").unwrap();
    bank.processor.transfer(2, 3, dec!(250), "rent").unwrap();
    bank.processor.deposit(3, dec!(40.75), "refund").unwrap();

    for id in [2, 3, CLEARING] {
        assert_eq!(bank.replayed_balance(id), bank.balance(id), "account {id}");
    }
}

#[test]
fn exchange_buy_round_trip_with_snapshot() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(10000));
    bank.seed(3, Currency::Usd, dec!(0));

    // Buy 100 USD at 41: cost 4100, commission 20.5.
    let tx = bank
        .processor
        .exchange_buy(2, 3, dec!(100), dec!(41), "buy usd")
        .unwrap();
    assert_eq!(bank.balance(2), dec!(5879.5));
    assert_eq!(bank.balance(3), dec!(100));
    assert_eq!(bank.balance(CLEARING), dec!(20.5));

    let snapshot = bank
        .processor
        .rates()
        .snapshot(tx.rate_snapshot.expect("exchange must snapshot"))
        .unwrap();
    assert_eq!(snapshot.provenance, RateProvenance::Live);

    let commissions = bank.transactions_of_kind(TransactionKind::ExchangeCommission);
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].amount, dec!(20.5));

    // Per-leg history rows carry the exchange-specific kinds.
    let source_history = bank.processor.balance_history(2).unwrap();
    assert_eq!(source_history[0].kind, TransactionKind::ExchangeWithdraw);
    let target_history = bank.processor.balance_history(3).unwrap();
    assert_eq!(target_history[0].kind, TransactionKind::ExchangeDeposit);
}

#[test]
fn exchange_sell_nets_commission_from_proceeds() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Usd, dec!(100));
    bank.seed(3, Currency::Try, dec!(0));

    // Sell 50 USD at 41: proceeds 2050, commission 10.25.
    bank.processor
        .exchange_sell(2, 3, dec!(50), dec!(41), "sell usd")
        .unwrap();
    assert_eq!(bank.balance(2), dec!(50));
    assert_eq!(bank.balance(3), dec!(2039.75));
    assert_eq!(bank.balance(CLEARING), dec!(10.25));
}

#[test]
fn fallback_rates_mark_provenance_and_price_fees() {
    let bank = TestBank::new(Box::new(DownSource));
    bank.seed(2, Currency::Usd, dec!(500));

    // Static table: 41.20 TRY per USD; fee 1 USD -> 41.20 TRY.
    let tx = bank.processor.withdraw(2, dec!(200), "usd out").unwrap();
    assert_eq!(tx.fee, dec!(1.0));
    assert_eq!(tx.fee_base, dec!(41.2000));
    assert_eq!(bank.balance(CLEARING), dec!(41.2000));

    let snapshot = bank
        .processor
        .rates()
        .snapshot(tx.rate_snapshot.unwrap())
        .unwrap();
    assert_eq!(snapshot.provenance, RateProvenance::Fallback);
}

#[test]
fn concurrent_same_account_withdrawals_never_over_debit() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(1000));

    // Each withdrawal debits 100.5, so at most 9 can succeed.
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let processor = Arc::clone(&bank.processor);
            thread::spawn(move || processor.withdraw(2, dec!(100), "race").is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().expect("thread panicked"))
        .filter(|&ok| ok)
        .count();

    assert_eq!(successes, 9);
    assert_eq!(bank.balance(2), dec!(95.5));
    assert_eq!(bank.balance(CLEARING), dec!(4.5));
    assert!(bank.balance(2) >= Decimal::ZERO);
}

#[test]
fn crossing_transfers_complete_without_deadlock() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(1000));
    bank.seed(3, Currency::Try, dec!(1000));

    let forward = {
        let processor = Arc::clone(&bank.processor);
        thread::spawn(move || {
            for _ in 0..100 {
                let _ = processor.transfer(2, 3, dec!(5), "ping");
            }
        })
    };
    let backward = {
        let processor = Arc::clone(&bank.processor);
        thread::spawn(move || {
            for _ in 0..100 {
                let _ = processor.transfer(3, 2, dec!(5), "pong");
            }
        })
    };
    forward.join().expect("forward thread");
    backward.join().expect("backward thread");

    // Money only moved between the two accounts and the clearing account.
    let total = bank.balance(2) + bank.balance(3) + bank.balance(CLEARING);
    assert_eq!(total, dec!(2000));
    assert!(bank.balance(2) >= Decimal::ZERO);
    assert!(bank.balance(3) >= Decimal::ZERO);
}

#[test]
fn transfers_naming_the_clearing_account_do_not_deadlock_fee_credits() {
    // Sweeps out of the clearing account race withdrawals whose fee
    // credit takes the clearing lock last; both must keep completing.
    let bank = TestBank::with_live_rates();
    bank.seed(5, Currency::Try, dec!(1000));
    bank.processor.deposit(CLEARING, dec!(1000), "float").unwrap();

    let (done, finished) = mpsc::channel();
    let sweeps = {
        let processor = Arc::clone(&bank.processor);
        let done = done.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                let _ = processor.transfer(CLEARING, 5, dec!(1), "sweep");
            }
            done.send(()).unwrap();
        })
    };
    let withdrawals = {
        let processor = Arc::clone(&bank.processor);
        thread::spawn(move || {
            for _ in 0..100 {
                let _ = processor.withdraw(5, dec!(1), "atm");
            }
            done.send(()).unwrap();
        })
    };
    for _ in 0..2 {
        finished
            .recv_timeout(Duration::from_secs(20))
            .expect("a worker never finished");
    }
    sweeps.join().expect("sweep thread");
    withdrawals.join().expect("withdrawal thread");

    // All movement stayed between the two accounts.
    let total = bank.balance(5) + bank.balance(CLEARING);
    assert_eq!(total, dec!(2000));
}

#[test]
fn concurrent_deposits_all_land() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let processor = Arc::clone(&bank.processor);
            thread::spawn(move || {
                for _ in 0..25 {
                    processor.deposit(2, dec!(1), "tick").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("deposit thread");
    }

    assert_eq!(bank.balance(2), dec!(200));
    assert_eq!(bank.replayed_balance(2), dec!(200));
}

#[test]
fn transactions_for_account_includes_fee_rows_it_caused() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(1000));

    bank.processor.withdraw(2, dec!(100), "atm").unwrap();

    // The fee row targets account 2, so the account query surfaces it.
    let rows = bank.processor.transactions_for_account(2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].kind, TransactionKind::Fee);
    assert_eq!(rows[1].kind, TransactionKind::Withdraw);
}

#[test]
fn inactive_destination_fails_transfer_before_any_mutation() {
    let bank = TestBank::with_live_rates();
    bank.seed(2, Currency::Try, dec!(500));
    bank.seed(3, Currency::Try, dec!(0));
    bank.ledger.deactivate(3);

    let err = bank.processor.transfer(2, 3, dec!(100), "closed").unwrap_err();
    assert_eq!(err, LedgerError::account_unavailable(3));
    assert_eq!(bank.balance(2), dec!(500));
    assert!(bank.transactions.is_empty());
}
