//! Error types for the banking ledger core
//!
//! This module defines all errors that can occur while processing ledger
//! operations. Every validation error is detected before any balance is
//! mutated, so callers may correct inputs and retry safely. The only
//! errors that can surface after a mutation has been applied are
//! [`LedgerError::Storage`] failures, which trigger compensation of the
//! already-applied legs (see the processor module).

use rust_decimal::Decimal;
use thiserror::Error;

use super::account::{AccountId, Currency};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Main error type for the ledger core
///
/// Each variant carries enough context (accounts, amounts, currencies)
/// to diagnose the failure and, for storage errors, to support manual or
/// automated reconciliation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// The account does not exist or has been deactivated
    ///
    /// Fatal to the call; not retried.
    #[error("Account {account} does not exist or is inactive")]
    AccountUnavailable {
        /// The account that was requested
        account: AccountId,
    },

    /// The balance check failed
    ///
    /// `required` includes the fee on fee-bearing operations. Surfaced to
    /// the caller verbatim; no account is mutated, including the clearing
    /// account.
    #[error("Insufficient funds on account {account}: balance {balance}, required {required}")]
    InsufficientFunds {
        /// Account whose balance was checked
        account: AccountId,
        /// Balance at validation time
        balance: Decimal,
        /// Total debit the operation required
        required: Decimal,
    },

    /// A transfer was attempted between accounts of different currencies
    ///
    /// Cross-currency movement is only permitted through an explicit
    /// exchange operation. Rejected with no mutation.
    #[error("Currency mismatch: account {from_account} holds {from_currency}, account {to_account} holds {to_currency}")]
    CurrencyMismatch {
        /// Source account
        from_account: AccountId,
        /// Source account currency
        from_currency: Currency,
        /// Destination account
        to_account: AccountId,
        /// Destination account currency
        to_currency: Currency,
    },

    /// Source and destination of a transfer are the same account
    #[error("Transfer source and destination are the same account {account}")]
    SameAccount {
        /// The repeated account id
        account: AccountId,
    },

    /// A non-positive monetary amount was supplied
    #[error("Invalid amount {amount}: amount must be positive")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// A non-positive exchange rate was supplied to an exchange operation
    #[error("Invalid exchange rate {rate}: rate must be positive")]
    InvalidRate {
        /// The rejected rate
        rate: Decimal,
    },

    /// A currency code outside the supported set was supplied
    ///
    /// This is a caller-programming error: fatal, not retried, and never
    /// degraded through the rate fallback chain.
    #[error("Unsupported currency code '{code}'")]
    UnsupportedCurrency {
        /// The unrecognized code
        code: String,
    },

    /// No exchange rate could be produced for the pair
    ///
    /// Reachable only if every fallback is exhausted, which the embedded
    /// static table is designed to prevent. Handled defensively.
    #[error("No exchange rate available for {from}/{to}")]
    RateUnavailable {
        /// Source currency
        from: Currency,
        /// Target currency
        to: Currency,
    },

    /// Checked decimal arithmetic overflowed
    ///
    /// The operation is rejected to preserve account integrity.
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that overflowed
        operation: String,
        /// Account being mutated
        account: AccountId,
    },

    /// A conversion product exceeded the representable decimal range
    #[error("Arithmetic overflow converting {amount} from {from} to {to}")]
    ConversionOverflow {
        /// Amount being converted
        amount: Decimal,
        /// Source currency
        from: Currency,
        /// Target currency
        to: Currency,
    },

    /// A persistence collaborator failed during the mutate/record phase
    ///
    /// The processor compensates already-applied legs and logs the full
    /// operation context before surfacing this error.
    #[error("Storage failure during {operation}: {message}")]
    Storage {
        /// Operation that was in flight
        operation: String,
        /// Collaborator-supplied failure detail
        message: String,
    },
}

impl LedgerError {
    /// Create an AccountUnavailable error
    pub fn account_unavailable(account: AccountId) -> Self {
        LedgerError::AccountUnavailable { account }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, balance: Decimal, required: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            balance,
            required,
        }
    }

    /// Create a CurrencyMismatch error
    pub fn currency_mismatch(
        from_account: AccountId,
        from_currency: Currency,
        to_account: AccountId,
        to_currency: Currency,
    ) -> Self {
        LedgerError::CurrencyMismatch {
            from_account,
            from_currency,
            to_account,
            to_currency,
        }
    }

    /// Create a SameAccount error
    pub fn same_account(account: AccountId) -> Self {
        LedgerError::SameAccount { account }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    /// Create an InvalidRate error
    pub fn invalid_rate(rate: Decimal) -> Self {
        LedgerError::InvalidRate { rate }
    }

    /// Create an UnsupportedCurrency error
    pub fn unsupported_currency(code: &str) -> Self {
        LedgerError::UnsupportedCurrency {
            code: code.to_string(),
        }
    }

    /// Create a RateUnavailable error
    pub fn rate_unavailable(from: Currency, to: Currency) -> Self {
        LedgerError::RateUnavailable { from, to }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create a ConversionOverflow error
    pub fn conversion_overflow(amount: Decimal, from: Currency, to: Currency) -> Self {
        LedgerError::ConversionOverflow { amount, from, to }
    }

    /// Create a Storage error
    pub fn storage(operation: &str, message: impl Into<String>) -> Self {
        LedgerError::Storage {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}
