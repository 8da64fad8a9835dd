//! Transaction processor
//!
//! The processor is the only component that mutates account balances. A
//! call runs Validate -> Compute -> Mutate -> Record -> Return with no
//! state carried between calls; every invocation revalidates against the
//! current store snapshot.
//!
//! Concurrency: balances live behind [`LedgerStore`], which is not
//! assumed to serialize validate-then-write sequences, so the processor
//! keeps its own keyed lock table. One account's validation and mutation
//! happen under that account's lock. The global lock order is:
//! non-clearing accounts by ascending id, the clearing account strictly
//! last. Two-account operations acquire their participant locks in that
//! order, so crossing transfers cannot deadlock, and the clearing lock
//! ranks last even when the clearing account is itself a transfer
//! participant. For every other fee-bearing operation the clearing
//! credit is a short independent increment under the clearing lock taken
//! last and released on return, so unrelated operations never serialize
//! on it.
//!
//! Partial failure: if a store write fails after earlier legs applied,
//! the applied legs are compensated in reverse order, each reversal is
//! recorded as a balance-history row so the audit stream stays
//! replayable, and the failure is logged with operation kind, accounts,
//! and amounts. Transaction and history rows are append-only, so a row
//! recorded before a later leg failed is left for reconciliation rather
//! than deleted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};

use super::fees::{round_money, FeePolicy};
use super::traits::{HistoryRecorder, LedgerStore, TransactionLog};
use crate::rates::RateProvider;
use crate::types::{
    Account, AccountId, BalanceHistoryEntry, Currency, LedgerError, NewBalanceHistoryEntry,
    NewTransaction, Result, SnapshotId, Transaction, TransactionKind, UserId,
};

/// Processor-level configuration
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Well-known account that collects fees and exchange commissions
    pub clearing_account: AccountId,

    /// Fee schedule applied to fee-bearing operations
    pub fees: FeePolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            clearing_account: 1,
            fees: FeePolicy::default(),
        }
    }
}

/// A balance write that has been applied and may need reversing
struct AppliedLeg {
    account: AccountId,
    previous_balance: Decimal,
    applied_balance: Decimal,
}

/// Parameters for the clearing-account credit leg
struct ClearingCredit {
    operation: &'static str,
    kind: TransactionKind,
    source: AccountId,
    amount: Decimal,
    rate_snapshot: Option<SnapshotId>,
    description: String,
    already_locked: bool,
}

/// Which direction an exchange moves value
#[derive(Clone, Copy)]
enum ExchangeSide {
    /// Base currency out, foreign currency in
    Buy,
    /// Foreign currency out, base currency in
    Sell,
}

/// Executes ledger operations against the collaborator traits
///
/// Shared across threads behind an `Arc`; all methods take `&self`.
pub struct TransactionProcessor {
    ledger: Arc<dyn LedgerStore>,
    transactions: Arc<dyn TransactionLog>,
    history: Arc<dyn HistoryRecorder>,
    rates: Arc<RateProvider>,
    config: ProcessorConfig,
    account_locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl TransactionProcessor {
    /// Create a processor with the default configuration
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        transactions: Arc<dyn TransactionLog>,
        history: Arc<dyn HistoryRecorder>,
        rates: Arc<RateProvider>,
    ) -> Self {
        Self::with_config(ledger, transactions, history, rates, ProcessorConfig::default())
    }

    /// Create a processor with an explicit configuration
    pub fn with_config(
        ledger: Arc<dyn LedgerStore>,
        transactions: Arc<dyn TransactionLog>,
        history: Arc<dyn HistoryRecorder>,
        rates: Arc<RateProvider>,
        config: ProcessorConfig,
    ) -> Self {
        TransactionProcessor {
            ledger,
            transactions,
            history,
            rates,
            config,
            account_locks: DashMap::new(),
        }
    }

    /// The exchange-rate provider backing fee conversions and exchanges
    pub fn rates(&self) -> &RateProvider {
        &self.rates
    }

    /// Credit funds into an account
    ///
    /// No fee. Records one transaction and one history row.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for non-positive amounts, `AccountUnavailable` for
    /// missing or inactive accounts, `Storage` on persistence failure.
    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        Self::require_positive(amount)?;

        let handle = self.lock_handle(account_id);
        let _guard = Self::lock(&handle);

        let account = self.ledger.get_active_account(account_id)?;
        let new_balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("deposit", account_id))?;

        let mut applied = Vec::new();
        let result = (|| -> Result<Transaction> {
            self.apply_balance(&mut applied, &account, new_balance)?;
            let tx = self.transactions.append(NewTransaction {
                account_id,
                target_account_id: None,
                amount,
                fee: Decimal::ZERO,
                fee_base: Decimal::ZERO,
                rate_snapshot: None,
                kind: TransactionKind::Deposit,
                description: description.to_string(),
                balance_after: new_balance,
            })?;
            self.record_leg(&account, new_balance, TransactionKind::Deposit, &tx)?;
            Ok(tx)
        })();
        if result.is_err() {
            self.compensate("deposit", &applied);
        }
        result
    }

    /// Debit funds from an account, charging the transaction fee
    ///
    /// The fee is computed on the gross amount and debited together with
    /// it; the clearing account is credited with the fee restated in the
    /// base currency. Records two transactions (withdraw + fee) and two
    /// history rows.
    ///
    /// # Errors
    ///
    /// `InsufficientFunds` when the balance does not cover amount + fee;
    /// no account is mutated in that case, the clearing account included.
    pub fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        Self::require_positive(amount)?;
        let clearing_id = self.config.clearing_account;
        self.ledger.get_active_account(clearing_id)?;

        let handle = self.lock_handle(account_id);
        let _guard = Self::lock(&handle);

        let account = self.ledger.get_active_account(account_id)?;
        let fee = self.config.fees.transaction_fee(amount);
        let required = amount
            .checked_add(fee)
            .ok_or_else(|| LedgerError::arithmetic_overflow("withdraw", account_id))?;
        if account.balance < required {
            return Err(LedgerError::insufficient_funds(
                account_id,
                account.balance,
                required,
            ));
        }
        let (fee_base, rate_snapshot) = self.fee_in_base(fee, account.currency)?;
        let new_balance = account.balance - required;

        let mut applied = Vec::new();
        let result = (|| -> Result<Transaction> {
            self.apply_balance(&mut applied, &account, new_balance)?;
            let tx = self.transactions.append(NewTransaction {
                account_id,
                target_account_id: None,
                amount,
                fee,
                fee_base,
                rate_snapshot,
                kind: TransactionKind::Withdraw,
                description: description.to_string(),
                balance_after: new_balance,
            })?;
            self.record_leg(&account, new_balance, TransactionKind::Withdraw, &tx)?;
            self.credit_clearing(
                &mut applied,
                ClearingCredit {
                    operation: "withdraw",
                    kind: TransactionKind::Fee,
                    source: account_id,
                    amount: fee_base,
                    rate_snapshot,
                    description: format!("fee for withdrawal from account {account_id}"),
                    already_locked: account_id == clearing_id,
                },
            )?;
            Ok(tx)
        })();
        if result.is_err() {
            self.compensate("withdraw", &applied);
        }
        result
    }

    /// Move funds between two same-currency accounts, charging the
    /// transaction fee to the source
    ///
    /// Debits the source by amount + fee, credits the destination by the
    /// amount, and credits the clearing account with the base-currency
    /// fee. Records two transactions (transfer + fee) and three history
    /// rows; the three deltas net to zero when the fee conversion is
    /// exact.
    ///
    /// # Errors
    ///
    /// `SameAccount` when source and destination coincide,
    /// `CurrencyMismatch` across currencies, `InsufficientFunds` when the
    /// source cannot cover amount + fee. Validation failures mutate
    /// nothing.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        Self::require_positive(amount)?;
        if from == to {
            return Err(LedgerError::same_account(from));
        }
        let clearing_id = self.config.clearing_account;
        self.ledger.get_active_account(clearing_id)?;

        let handles = self.participant_handles(from, to);
        let _guards: Vec<MutexGuard<'_, ()>> = handles.iter().map(|h| Self::lock(h)).collect();

        let source = self.ledger.get_active_account(from)?;
        let destination = self.ledger.get_active_account(to)?;
        if source.currency != destination.currency {
            return Err(LedgerError::currency_mismatch(
                from,
                source.currency,
                to,
                destination.currency,
            ));
        }
        let fee = self.config.fees.transaction_fee(amount);
        let required = amount
            .checked_add(fee)
            .ok_or_else(|| LedgerError::arithmetic_overflow("transfer", from))?;
        if source.balance < required {
            return Err(LedgerError::insufficient_funds(from, source.balance, required));
        }
        let (fee_base, rate_snapshot) = self.fee_in_base(fee, source.currency)?;
        let source_after = source.balance - required;
        let destination_after = destination
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("transfer", to))?;

        let mut applied = Vec::new();
        let result = (|| -> Result<Transaction> {
            self.apply_balance(&mut applied, &source, source_after)?;
            self.apply_balance(&mut applied, &destination, destination_after)?;
            let tx = self.transactions.append(NewTransaction {
                account_id: from,
                target_account_id: Some(to),
                amount,
                fee,
                fee_base,
                rate_snapshot,
                kind: TransactionKind::Transfer,
                description: description.to_string(),
                balance_after: source_after,
            })?;
            self.record_leg(&source, source_after, TransactionKind::Transfer, &tx)?;
            self.record_leg(&destination, destination_after, TransactionKind::Transfer, &tx)?;
            self.credit_clearing(
                &mut applied,
                ClearingCredit {
                    operation: "transfer",
                    kind: TransactionKind::Fee,
                    source: from,
                    amount: fee_base,
                    rate_snapshot,
                    description: format!("fee for transfer from account {from} to account {to}"),
                    already_locked: clearing_id == from || clearing_id == to,
                },
            )?;
            Ok(tx)
        })();
        if result.is_err() {
            self.compensate("transfer", &applied);
        }
        result
    }

    /// Buy foreign currency with base currency
    ///
    /// `from` must hold the base currency and `to` the foreign currency;
    /// `amount` is the foreign amount bought at `rate` (base units per
    /// foreign unit). The base account is debited cost + commission, the
    /// foreign account is credited the amount, and the clearing account
    /// receives the commission. The transaction references the rate
    /// snapshot in effect at execution time.
    pub fn exchange_buy(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        rate: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.exchange(ExchangeSide::Buy, from, to, amount, rate, description)
    }

    /// Sell foreign currency for base currency
    ///
    /// Mirror image of [`TransactionProcessor::exchange_buy`]: `from`
    /// holds the foreign currency, `to` the base currency, and the
    /// commission is deducted from the base-currency proceeds before the
    /// credit.
    pub fn exchange_sell(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        rate: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        self.exchange(ExchangeSide::Sell, from, to, amount, rate, description)
    }

    fn exchange(
        &self,
        side: ExchangeSide,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        rate: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        Self::require_positive(amount)?;
        if rate <= Decimal::ZERO {
            return Err(LedgerError::invalid_rate(rate));
        }
        if from == to {
            return Err(LedgerError::same_account(from));
        }
        let clearing_id = self.config.clearing_account;
        self.ledger.get_active_account(clearing_id)?;

        let handles = self.participant_handles(from, to);
        let _guards: Vec<MutexGuard<'_, ()>> = handles.iter().map(|h| Self::lock(h)).collect();

        let source = self.ledger.get_active_account(from)?;
        let destination = self.ledger.get_active_account(to)?;
        let shape_ok = match side {
            ExchangeSide::Buy => source.currency.is_base() && !destination.currency.is_base(),
            ExchangeSide::Sell => !source.currency.is_base() && destination.currency.is_base(),
        };
        if !shape_ok {
            return Err(LedgerError::currency_mismatch(
                from,
                source.currency,
                to,
                destination.currency,
            ));
        }

        let operation = match side {
            ExchangeSide::Buy => "exchange-buy",
            ExchangeSide::Sell => "exchange-sell",
        };
        // `amount` is denominated in the foreign currency on both sides;
        // `counter` is its base-currency value at the quoted rate.
        let counter = amount
            .checked_mul(rate)
            .map(round_money)
            .ok_or_else(|| LedgerError::arithmetic_overflow(operation, from))?;
        let commission = self.config.fees.exchange_commission(counter);

        let (kind, debit, credit) = match side {
            ExchangeSide::Buy => {
                let required = counter
                    .checked_add(commission)
                    .ok_or_else(|| LedgerError::arithmetic_overflow(operation, from))?;
                (TransactionKind::ExchangeBuy, required, amount)
            }
            ExchangeSide::Sell => {
                (TransactionKind::ExchangeSell, amount, counter - commission)
            }
        };
        if source.balance < debit {
            return Err(LedgerError::insufficient_funds(from, source.balance, debit));
        }
        let source_after = source.balance - debit;
        let destination_after = destination
            .balance
            .checked_add(credit)
            .ok_or_else(|| LedgerError::arithmetic_overflow(operation, to))?;
        let tx_amount = match side {
            ExchangeSide::Buy => counter,
            ExchangeSide::Sell => amount,
        };

        // Snapshot only after validation: failed calls leave no audit rows.
        let snapshot = self.rates.record_snapshot();

        let mut applied = Vec::new();
        let result = (|| -> Result<Transaction> {
            self.apply_balance(&mut applied, &source, source_after)?;
            self.apply_balance(&mut applied, &destination, destination_after)?;
            let tx = self.transactions.append(NewTransaction {
                account_id: from,
                target_account_id: Some(to),
                amount: tx_amount,
                fee: commission,
                fee_base: commission,
                rate_snapshot: Some(snapshot.id),
                kind,
                description: description.to_string(),
                balance_after: source_after,
            })?;
            self.record_leg(&source, source_after, TransactionKind::ExchangeWithdraw, &tx)?;
            self.record_leg(
                &destination,
                destination_after,
                TransactionKind::ExchangeDeposit,
                &tx,
            )?;
            self.credit_clearing(
                &mut applied,
                ClearingCredit {
                    operation,
                    kind: TransactionKind::ExchangeCommission,
                    source: from,
                    amount: commission,
                    rate_snapshot: Some(snapshot.id),
                    description: format!(
                        "commission for exchange from account {from} to account {to}"
                    ),
                    already_locked: clearing_id == from || clearing_id == to,
                },
            )?;
            Ok(tx)
        })();
        if result.is_err() {
            self.compensate(operation, &applied);
        }
        result
    }

    /// All transactions touching an account, newest first
    pub fn transactions_for_account(&self, account: AccountId) -> Result<Vec<Transaction>> {
        self.transactions.transactions_for_account(account)
    }

    /// Transactions within an optional time window, scoped to an account
    /// or to all accounts of a user, newest first
    ///
    /// An explicit account takes precedence over a user scope. With
    /// neither, all transactions in the window are returned.
    pub fn transactions_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        account: Option<AccountId>,
        user: Option<UserId>,
    ) -> Result<Vec<Transaction>> {
        let scope: Option<Vec<AccountId>> = match (account, user) {
            (Some(id), _) => Some(vec![id]),
            (None, Some(user_id)) => Some(
                self.ledger
                    .accounts_for_user(user_id)?
                    .into_iter()
                    .map(|a| a.id)
                    .collect(),
            ),
            (None, None) => None,
        };
        self.transactions
            .transactions_in_range(start, end, scope.as_deref())
    }

    /// All balance-history entries for an account, newest first
    pub fn balance_history(&self, account: AccountId) -> Result<Vec<BalanceHistoryEntry>> {
        self.history.history_for_account(account)
    }

    /// Balance-history entries for an account within a time window,
    /// newest first
    pub fn balance_history_in_range(
        &self,
        account: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BalanceHistoryEntry>> {
        self.history.history_in_range(account, start, end)
    }

    fn require_positive(amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(amount));
        }
        Ok(())
    }

    fn lock_handle(&self, id: AccountId) -> Arc<Mutex<()>> {
        self.account_locks.entry(id).or_default().clone()
    }

    /// Lock handles for a two-account operation, in the global order
    ///
    /// Non-clearing accounts rank by ascending id and the clearing
    /// account ranks last, matching `credit_clearing` acquiring it after
    /// the participant locks. A transfer naming the clearing account
    /// therefore takes the clearing lock in the same position as a
    /// concurrent withdrawal's fee credit, so the two cannot cycle.
    fn participant_handles(&self, from: AccountId, to: AccountId) -> Vec<Arc<Mutex<()>>> {
        let clearing_id = self.config.clearing_account;
        let mut ids = vec![from, to];
        ids.sort_unstable_by_key(|id| (*id == clearing_id, *id));
        ids.into_iter().map(|id| self.lock_handle(id)).collect()
    }

    /// Acquire an account lock, recovering from poisoning
    ///
    /// The guarded data is `()`, so a panic while holding the lock cannot
    /// leave it inconsistent.
    fn lock(handle: &Mutex<()>) -> MutexGuard<'_, ()> {
        handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restate a fee in the base currency, recording the snapshot used
    fn fee_in_base(&self, fee: Decimal, currency: Currency) -> Result<(Decimal, Option<SnapshotId>)> {
        if currency.is_base() || fee.is_zero() {
            return Ok((fee, None));
        }
        let conversion = self.rates.convert_recorded(fee, currency, Currency::BASE)?;
        Ok((round_money(conversion.amount), conversion.snapshot))
    }

    /// Write one balance and remember its previous value for compensation
    fn apply_balance(
        &self,
        applied: &mut Vec<AppliedLeg>,
        account: &Account,
        new_balance: Decimal,
    ) -> Result<Account> {
        let updated = self.ledger.update_balance(account.id, new_balance)?;
        applied.push(AppliedLeg {
            account: account.id,
            previous_balance: account.balance,
            applied_balance: new_balance,
        });
        Ok(updated)
    }

    /// Record the history row for one applied leg
    fn record_leg(
        &self,
        account: &Account,
        balance_after: Decimal,
        kind: TransactionKind,
        tx: &Transaction,
    ) -> Result<()> {
        self.history.record(NewBalanceHistoryEntry {
            account_id: account.id,
            balance_before: account.balance,
            balance_after,
            kind,
            description: tx.description.clone(),
            transaction_id: Some(tx.id),
        })?;
        Ok(())
    }

    /// Credit the clearing account and record its fee transaction
    ///
    /// Takes the clearing lock last and releases it on return, unless the
    /// clearing account is itself a locked participant of the operation.
    fn credit_clearing(
        &self,
        applied: &mut Vec<AppliedLeg>,
        credit: ClearingCredit,
    ) -> Result<()> {
        let clearing_id = self.config.clearing_account;
        let handle = self.lock_handle(clearing_id);
        let _guard = if credit.already_locked {
            None
        } else {
            Some(Self::lock(&handle))
        };

        let clearing = self.ledger.get_active_account(clearing_id)?;
        let new_balance = clearing
            .balance
            .checked_add(credit.amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow(credit.operation, clearing_id))?;
        self.apply_balance(applied, &clearing, new_balance)?;
        let tx = self.transactions.append(NewTransaction {
            account_id: clearing_id,
            target_account_id: Some(credit.source),
            amount: credit.amount,
            fee: Decimal::ZERO,
            fee_base: Decimal::ZERO,
            rate_snapshot: credit.rate_snapshot,
            kind: credit.kind,
            description: credit.description,
            balance_after: new_balance,
        })?;
        self.record_leg(&clearing, new_balance, credit.kind, &tx)?;
        Ok(())
    }

    /// Reverse applied legs after a mid-operation failure
    ///
    /// Runs in reverse application order. Each restored leg appends a
    /// reversal history row, so replaying the account's history still
    /// reproduces its stored balance. A leg that cannot be restored, or
    /// whose reversal row cannot be recorded, is logged with enough
    /// detail for reconciliation.
    fn compensate(&self, operation: &str, applied: &[AppliedLeg]) {
        if applied.is_empty() {
            return;
        }
        log::error!(
            "{operation} failed after {} applied leg(s), compensating",
            applied.len()
        );
        for leg in applied.iter().rev() {
            if let Err(err) = self.ledger.update_balance(leg.account, leg.previous_balance) {
                log::error!(
                    "compensation for {operation} could not restore account {} to {}: {err}",
                    leg.account,
                    leg.previous_balance
                );
                continue;
            }
            if let Err(err) = self.history.record(NewBalanceHistoryEntry {
                account_id: leg.account,
                balance_before: leg.applied_balance,
                balance_after: leg.previous_balance,
                kind: TransactionKind::Reversal,
                description: format!("reversal of failed {operation}"),
                transaction_id: None,
            }) {
                log::error!(
                    "reversal of failed {operation} on account {} ({} -> {}) was not recorded: {err}",
                    leg.account,
                    leg.applied_balance,
                    leg.previous_balance
                );
            }
        }
    }
}
