//! Balance history types
//!
//! Every balance mutation appends one [`BalanceHistoryEntry`]. Replaying
//! all entries for an account from a zero balance must reproduce the
//! stored balance exactly; the processor's tests rely on this property.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::AccountId;
use super::transaction::{TransactionId, TransactionKind};

/// One immutable balance-mutation record for a single account leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceHistoryEntry {
    /// The account whose balance changed
    pub account_id: AccountId,

    /// Balance before the mutation
    pub balance_before: Decimal,

    /// Balance after the mutation
    pub balance_after: Decimal,

    /// Signed change applied (`balance_after - balance_before`)
    pub delta: Decimal,

    /// Change category, mirroring the causing transaction's kind
    pub kind: TransactionKind,

    /// Free-text description
    pub description: String,

    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,

    /// Back-reference to the transaction that caused this change
    pub transaction_id: Option<TransactionId>,
}

/// Input for recording a history entry; the timestamp is assigned by the
/// recorder
#[derive(Debug, Clone)]
pub struct NewBalanceHistoryEntry {
    /// The account whose balance changed
    pub account_id: AccountId,
    /// Balance before the mutation
    pub balance_before: Decimal,
    /// Balance after the mutation
    pub balance_after: Decimal,
    /// Change category
    pub kind: TransactionKind,
    /// Free-text description
    pub description: String,
    /// Back-reference to the causing transaction
    pub transaction_id: Option<TransactionId>,
}

impl NewBalanceHistoryEntry {
    /// Signed delta implied by the before/after pair
    pub fn delta(&self) -> Decimal {
        self.balance_after - self.balance_before
    }
}
