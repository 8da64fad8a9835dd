//! Transaction types for the banking ledger core
//!
//! A [`Transaction`] is the system of record for money movement: once a
//! row is appended it is never mutated or deleted. Multi-leg operations
//! (withdrawals with fees, transfers, exchanges) append one row for the
//! operation itself plus one row for the clearing-account fee credit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::AccountId;

/// Transaction identifier, assigned by the transaction log on append
pub type TransactionId = u64;

/// Exchange-rate snapshot identifier
pub type SnapshotId = u64;

/// Operation kind recorded on transactions and balance-history entries
///
/// The `ExchangeDeposit` and `ExchangeWithdraw` kinds label the per-leg
/// history rows of an exchange; the exchange transaction itself is
/// recorded as `ExchangeBuy` or `ExchangeSell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    /// Credit funds into an account, no fee
    Deposit,
    /// Debit funds from an account, fee-bearing
    Withdraw,
    /// Same-currency movement between two accounts, fee-bearing
    Transfer,
    /// Fee credit to the clearing account
    Fee,
    /// Purchase of foreign currency with base currency
    ExchangeBuy,
    /// Sale of foreign currency for base currency
    ExchangeSell,
    /// Commission credit to the clearing account for an exchange
    ExchangeCommission,
    /// Credit leg of an exchange (history rows only)
    ExchangeDeposit,
    /// Debit leg of an exchange (history rows only)
    ExchangeWithdraw,
    /// Compensating reversal of an applied leg after a failed operation
    /// (history rows only)
    Reversal,
}

/// An immutable, append-only transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier
    pub id: TransactionId,

    /// Source account of the operation
    pub account_id: AccountId,

    /// Target account, set only for transfers and exchange legs
    pub target_account_id: Option<AccountId>,

    /// Monetary amount of the operation, in the source account's currency
    pub amount: Decimal,

    /// Fee charged, in the source account's currency
    pub fee: Decimal,

    /// The same fee restated in the ledger's base currency
    pub fee_base: Decimal,

    /// Exchange-rate snapshot used for the fee conversion, if any
    pub rate_snapshot: Option<SnapshotId>,

    /// Operation kind
    pub kind: TransactionKind,

    /// Free-text description supplied by the caller
    pub description: String,

    /// When the transaction was recorded
    pub timestamp: DateTime<Utc>,

    /// Source account balance immediately after the mutation
    pub balance_after: Decimal,
}

/// Input for appending a transaction; id and timestamp are assigned by
/// the transaction log
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Source account of the operation
    pub account_id: AccountId,
    /// Target account, set only for transfers and exchange legs
    pub target_account_id: Option<AccountId>,
    /// Monetary amount in the source account's currency
    pub amount: Decimal,
    /// Fee in the source account's currency
    pub fee: Decimal,
    /// Fee restated in the base currency
    pub fee_base: Decimal,
    /// Snapshot used for the fee conversion, if any
    pub rate_snapshot: Option<SnapshotId>,
    /// Operation kind
    pub kind: TransactionKind,
    /// Free-text description
    pub description: String,
    /// Source account balance after the mutation
    pub balance_after: Decimal,
}
