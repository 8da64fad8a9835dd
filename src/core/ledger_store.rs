//! In-memory ledger store
//!
//! Reference implementation of [`LedgerStore`] over a concurrent map.
//! Account creation and deactivation belong to an external collaborator;
//! this store exposes them only as seeding helpers so tests and embedded
//! deployments can stand in for it.

use dashmap::DashMap;
use rust_decimal::Decimal;

use super::traits::LedgerStore;
use crate::types::{Account, AccountId, LedgerError, Result, UserId};

/// Thread-safe in-memory account store
///
/// `DashMap` gives per-entry locking, so lookups and balance writes for
/// different accounts never contend. Serializing validate-then-write
/// sequences per account is the processor's job, not the store's.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: DashMap<AccountId, Account>,
}

impl InMemoryLedger {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account (account-management stand-in)
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Deactivate an account (account-management stand-in)
    pub fn deactivate(&self, id: AccountId) {
        if let Some(mut account) = self.accounts.get_mut(&id) {
            account.active = false;
        }
    }

    /// Raw account lookup, inactive accounts included
    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id).map(|a| a.clone())
    }
}

impl LedgerStore for InMemoryLedger {
    fn get_active_account(&self, id: AccountId) -> Result<Account> {
        match self.accounts.get(&id) {
            Some(account) if account.active => Ok(account.clone()),
            _ => Err(LedgerError::account_unavailable(id)),
        }
    }

    fn update_balance(&self, id: AccountId, new_balance: Decimal) -> Result<Account> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::account_unavailable(id))?;
        account.balance = new_balance;
        Ok(account.clone())
    }

    fn accounts_for_user(&self, user_id: UserId) -> Result<Vec<Account>> {
        Ok(self
            .accounts
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountKind, Currency};
    use rust_decimal_macros::dec;

    fn checking(id: AccountId, user: UserId) -> Account {
        Account::new(id, user, format!("TR00-{id:04}"), AccountKind::Checking, Currency::Try)
    }

    #[test]
    fn test_get_active_account_returns_inserted_account() {
        let store = InMemoryLedger::new();
        store.insert(checking(1, 10));

        let account = store.get_active_account(1).unwrap();
        assert_eq!(account.id, 1);
        assert_eq!(account.user_id, 10);
    }

    #[test]
    fn test_get_active_account_fails_for_missing_account() {
        let store = InMemoryLedger::new();
        let err = store.get_active_account(99).unwrap_err();
        assert_eq!(err, LedgerError::account_unavailable(99));
    }

    #[test]
    fn test_get_active_account_fails_for_inactive_account() {
        let store = InMemoryLedger::new();
        store.insert(checking(1, 10));
        store.deactivate(1);

        let err = store.get_active_account(1).unwrap_err();
        assert_eq!(err, LedgerError::account_unavailable(1));
    }

    #[test]
    fn test_update_balance_replaces_stored_balance() {
        let store = InMemoryLedger::new();
        store.insert(checking(1, 10));

        let updated = store.update_balance(1, dec!(250.75)).unwrap();
        assert_eq!(updated.balance, dec!(250.75));
        assert_eq!(store.account(1).unwrap().balance, dec!(250.75));
    }

    #[test]
    fn test_update_balance_fails_for_missing_account() {
        let store = InMemoryLedger::new();
        let err = store.update_balance(7, dec!(1)).unwrap_err();
        assert_eq!(err, LedgerError::account_unavailable(7));
    }

    #[test]
    fn test_accounts_for_user_filters_by_owner() {
        let store = InMemoryLedger::new();
        store.insert(checking(1, 10));
        store.insert(checking(2, 10));
        store.insert(checking(3, 20));

        let mut ids: Vec<AccountId> = store
            .accounts_for_user(10)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }
}
