//! In-memory balance history recorder
//!
//! Reference implementation of [`HistoryRecorder`]. Entries are grouped
//! per account in append order, so replaying an account's deltas from
//! zero reproduces its stored balance.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::traits::HistoryRecorder;
use crate::types::{AccountId, BalanceHistoryEntry, NewBalanceHistoryEntry, Result};

/// Thread-safe append-only balance history store
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: DashMap<AccountId, Vec<BalanceHistoryEntry>>,
}

impl InMemoryHistory {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all accounts, for tests
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    /// Whether no entry has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryRecorder for InMemoryHistory {
    fn record(&self, entry: NewBalanceHistoryEntry) -> Result<BalanceHistoryEntry> {
        let row = BalanceHistoryEntry {
            account_id: entry.account_id,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            delta: entry.delta(),
            kind: entry.kind,
            description: entry.description,
            timestamp: Utc::now(),
            transaction_id: entry.transaction_id,
        };
        self.entries
            .entry(row.account_id)
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    fn history_for_account(&self, account: AccountId) -> Result<Vec<BalanceHistoryEntry>> {
        Ok(self
            .entries
            .get(&account)
            .map(|rows| rows.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn history_in_range(
        &self,
        account: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BalanceHistoryEntry>> {
        Ok(self
            .entries
            .get(&account)
            .map(|rows| {
                rows.iter()
                    .rev()
                    .filter(|e| e.timestamp >= start && e.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
