//! Collaborator traits for the transaction processor
//!
//! These traits are the persistence boundary of the core: the processor
//! talks to the ledger store, the transaction log, and the balance
//! history recorder exclusively through them. The in-memory
//! implementations in this crate serve tests and embedded use; a real
//! deployment supplies database-backed implementations.
//!
//! None of these contracts is assumed atomic across multiple accounts:
//! the processor issues one update per affected account and owns the
//! ordering and compensation policy itself.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{
    Account, AccountId, BalanceHistoryEntry, NewBalanceHistoryEntry, NewTransaction, Result,
    Transaction, UserId,
};

/// Account lookup and balance mutation
pub trait LedgerStore: Send + Sync {
    /// Fetch an account that exists and is active
    ///
    /// Fails with `AccountUnavailable` when the account is missing or
    /// has been deactivated.
    fn get_active_account(&self, id: AccountId) -> Result<Account>;

    /// Replace the stored balance of an account
    ///
    /// This is the sole mutation primitive the processor uses; there are
    /// no partial-field updates to race against. Returns the account as
    /// stored after the write.
    fn update_balance(&self, id: AccountId, new_balance: Decimal) -> Result<Account>;

    /// All accounts owned by a user, for user-scoped transaction queries
    fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>>;
}

/// Append-only transaction record store
pub trait TransactionLog: Send + Sync {
    /// Append a transaction, assigning its id and timestamp
    fn append(&self, transaction: NewTransaction) -> Result<Transaction>;

    /// All transactions touching an account (as source or target),
    /// newest first
    fn transactions_for_account(&self, account: AccountId) -> Result<Vec<Transaction>>;

    /// Transactions within an optional time window, optionally scoped to
    /// a set of accounts, newest first
    fn transactions_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        accounts: Option<&[AccountId]>,
    ) -> Result<Vec<Transaction>>;
}

/// Append-only balance history store
pub trait HistoryRecorder: Send + Sync {
    /// Record one balance mutation, assigning its timestamp
    fn record(&self, entry: NewBalanceHistoryEntry) -> Result<BalanceHistoryEntry>;

    /// All entries for an account, newest first
    fn history_for_account(&self, account: AccountId) -> Result<Vec<BalanceHistoryEntry>>;

    /// Entries for an account within a time window, newest first
    fn history_in_range(
        &self,
        account: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BalanceHistoryEntry>>;
}
