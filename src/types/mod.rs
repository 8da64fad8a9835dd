//! Types module
//!
//! Contains the core data model used throughout the ledger:
//! - `account`: accounts, currencies, and identifier aliases
//! - `transaction`: the append-only transaction record
//! - `history`: the append-only balance history entry
//! - `error`: the error taxonomy for ledger operations

pub mod account;
pub mod error;
pub mod history;
pub mod transaction;

pub use account::{Account, AccountId, AccountKind, Currency, UserId};
pub use error::{LedgerError, Result};
pub use history::{BalanceHistoryEntry, NewBalanceHistoryEntry};
pub use transaction::{NewTransaction, SnapshotId, Transaction, TransactionId, TransactionKind};
