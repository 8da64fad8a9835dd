//! Core business logic module
//!
//! This module contains the ledger's business logic components:
//! - `traits` - Collaborator traits at the persistence boundary
//! - `processor` - The transaction processor orchestrating all operations
//! - `fees` - Fee schedule and monetary rounding
//! - `ledger_store` - In-memory account store
//! - `transaction_log` - In-memory append-only transaction log
//! - `history_recorder` - In-memory balance history recorder

pub mod fees;
pub mod history_recorder;
pub mod ledger_store;
pub mod processor;
pub mod traits;
pub mod transaction_log;

pub use fees::{round_money, FeePolicy};
pub use history_recorder::InMemoryHistory;
pub use ledger_store::InMemoryLedger;
pub use processor::{ProcessorConfig, TransactionProcessor};
pub use traits::{HistoryRecorder, LedgerStore, TransactionLog};
pub use transaction_log::InMemoryTransactionLog;
