//! Banking Ledger Engine Library
//! # Overview
//!
//! This library is the account ledger and transaction processor of a
//! retail banking back end: it mutates balances, computes fees, converts
//! currencies, and produces an immutable audit trail. HTTP routing,
//! authentication, and account administration are external collaborators
//! reached through trait boundaries.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Transaction, Currency, etc.)
//! - [`rates`] - Exchange-rate provider:
//!   - [`rates::RateProvider`] - Cached rate table with live fetch and
//!     static fallback, plus the snapshot journal
//!   - [`rates::QuoteSource`] - Pluggable live quote source (HTTP
//!     implementation included)
//! - [`core`] - Business logic components:
//!   - [`core::TransactionProcessor`] - Operation orchestration with
//!     per-account locking
//!   - [`core::traits`] - Persistence collaborator traits
//!   - In-memory reference implementations for tests and embedded use
//!
//! # Operations
//!
//! The processor supports five money-moving operations:
//!
//! - **Deposit**: Credit funds to an account, no fee
//! - **Withdraw**: Debit funds plus a 0.5% fee credited to the clearing
//!   account in the base currency
//! - **Transfer**: Same-currency movement between two accounts, fee on
//!   the gross amount
//! - **Exchange buy/sell**: Currency exchange between a base-currency
//!   and a foreign-currency account, with a commission leg and a rate
//!   snapshot reference
//!
//! plus read-side queries over the transaction log and balance history.
//!
//! # Invariants
//!
//! - Transfer legs and the clearing fee credit net to zero
//! - A transaction's resulting balance equals the stored balance
//!   immediately after the mutation
//! - Replaying an account's history deltas from zero reproduces its
//!   stored balance
//! - No negative balance is ever persisted
//! - Cross-currency movement only happens through exchange operations

// Module declarations
pub mod core;
pub mod rates;
pub mod types;

pub use core::{
    FeePolicy, HistoryRecorder, InMemoryHistory, InMemoryLedger, InMemoryTransactionLog,
    LedgerStore, ProcessorConfig, TransactionLog, TransactionProcessor,
};
pub use rates::{Conversion, ExchangeRateSnapshot, QuoteSource, RateProvenance, RateProvider};
pub use types::{
    Account, AccountId, AccountKind, BalanceHistoryEntry, Currency, LedgerError, Result,
    SnapshotId, Transaction, TransactionId, TransactionKind, UserId,
};
