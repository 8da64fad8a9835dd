//! Account-related types for the banking ledger core
//!
//! This module defines the Account entity, its currency and category
//! enumerations, and the identifier aliases used throughout the system.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

/// Account identifier
pub type AccountId = u32;

/// Owning-user identifier
pub type UserId = u32;

/// Supported currencies
///
/// The set is fixed: money can only be held and moved in one of these
/// currencies. Parsing any other code is a caller-programming error
/// surfaced as [`LedgerError::UnsupportedCurrency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Turkish lira, the ledger's base currency
    Try,
    /// United States dollar
    Usd,
    /// Euro
    Eur,
    /// Pound sterling
    Gbp,
    /// Swiss franc
    Chf,
}

impl Currency {
    /// The currency all stored exchange rates are expressed relative to.
    ///
    /// Fee credits to the clearing account are always restated in this
    /// currency before being applied.
    pub const BASE: Currency = Currency::Try;

    /// All supported currencies, used to build complete rate tables
    pub const ALL: [Currency; 5] = [
        Currency::Try,
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Chf,
    ];

    /// ISO 4217 code for this currency
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Try => "TRY",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Chf => "CHF",
        }
    }

    /// Whether this is the ledger's base currency
    pub fn is_base(&self) -> bool {
        *self == Self::BASE
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRY" => Ok(Currency::Try),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "CHF" => Ok(Currency::Chf),
            other => Err(LedgerError::unsupported_currency(other)),
        }
    }
}

/// Account category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Day-to-day current account
    Checking,
    /// Term deposit account
    Term,
    /// Credit account
    Credit,
    /// Commercial account
    Commercial,
}

/// A customer (or bank-owned) currency account
///
/// The balance is mutated only by the transaction processor; account
/// creation and deactivation belong to an external account-management
/// collaborator. The balance is never persisted negative: any operation
/// that would take it below zero is rejected before mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier
    pub id: AccountId,

    /// The user who owns this account
    pub user_id: UserId,

    /// Externally-visible account number
    pub number: String,

    /// Account category (checking/term/credit/commercial)
    pub kind: AccountKind,

    /// Currency this account is denominated in
    pub currency: Currency,

    /// Current balance, fixed-point decimal, always >= 0 once persisted
    pub balance: Decimal,

    /// Whether the account accepts operations
    pub active: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account with a zero balance
    pub fn new(
        id: AccountId,
        user_id: UserId,
        number: impl Into<String>,
        kind: AccountKind,
        currency: Currency,
    ) -> Self {
        Account {
            id,
            user_id,
            number: number.into(),
            kind,
            currency,
            balance: Decimal::ZERO,
            active: true,
            created_at: Utc::now(),
        }
    }
}
