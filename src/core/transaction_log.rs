//! In-memory transaction log
//!
//! Reference implementation of [`TransactionLog`]. Rows are kept in
//! append order (which is chronological) and never mutated or removed;
//! queries return clones, newest first.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::traits::TransactionLog;
use crate::types::{AccountId, NewTransaction, Result, Transaction, TransactionId};

/// Thread-safe append-only transaction store
#[derive(Debug, Default)]
pub struct InMemoryTransactionLog {
    entries: RwLock<Vec<Transaction>>,
    next_id: AtomicU64,
}

impl InMemoryTransactionLog {
    /// Create an empty log
    pub fn new() -> Self {
        InMemoryTransactionLog {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Total number of rows, for tests and reconciliation checks
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, Vec<Transaction>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touches(transaction: &Transaction, account: AccountId) -> bool {
        transaction.account_id == account || transaction.target_account_id == Some(account)
    }
}

impl TransactionLog for InMemoryTransactionLog {
    fn append(&self, transaction: NewTransaction) -> Result<Transaction> {
        let id: TransactionId = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = Transaction {
            id,
            account_id: transaction.account_id,
            target_account_id: transaction.target_account_id,
            amount: transaction.amount,
            fee: transaction.fee,
            fee_base: transaction.fee_base,
            rate_snapshot: transaction.rate_snapshot,
            kind: transaction.kind,
            description: transaction.description,
            timestamp: Utc::now(),
            balance_after: transaction.balance_after,
        };
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.push(row.clone());
        Ok(row)
    }

    fn transactions_for_account(&self, account: AccountId) -> Result<Vec<Transaction>> {
        Ok(self
            .read_entries()
            .iter()
            .rev()
            .filter(|t| Self::touches(t, account))
            .cloned()
            .collect())
    }

    fn transactions_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        accounts: Option<&[AccountId]>,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .read_entries()
            .iter()
            .rev()
            .filter(|t| start.is_none_or(|s| t.timestamp >= s))
            .filter(|t| end.is_none_or(|e| t.timestamp <= e))
            .filter(|t| {
                accounts.is_none_or(|ids| ids.iter().any(|id| Self::touches(t, *id)))
            })
            .cloned()
            .collect())
    }
}
