//! Fee schedule
//!
//! Fee percentages are a policy input rather than constants baked into
//! the operations, so deployments can vary them without touching the
//! processor. Fees are always computed on the gross requested amount,
//! never on the post-fee balance.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Default rate for withdrawal and transfer fees (0.5%)
pub const DEFAULT_TRANSACTION_FEE_RATE: Decimal = dec!(0.005);

/// Default commission rate for currency exchanges (0.5%)
pub const DEFAULT_EXCHANGE_COMMISSION_RATE: Decimal = dec!(0.005);

/// Round a monetary value to the ledger's 4-decimal precision
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Percentage-based fee schedule applied by the processor
#[derive(Debug, Clone, PartialEq)]
pub struct FeePolicy {
    /// Rate applied to withdrawals and transfers
    pub transaction_fee_rate: Decimal,

    /// Rate applied to the base-currency leg of an exchange
    pub exchange_commission_rate: Decimal,
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy {
            transaction_fee_rate: DEFAULT_TRANSACTION_FEE_RATE,
            exchange_commission_rate: DEFAULT_EXCHANGE_COMMISSION_RATE,
        }
    }
}

impl FeePolicy {
    /// Fee for a withdrawal or transfer of `gross`
    pub fn transaction_fee(&self, gross: Decimal) -> Decimal {
        round_money(gross * self.transaction_fee_rate)
    }

    /// Commission for an exchange whose base-currency leg is `gross`
    pub fn exchange_commission(&self, gross: Decimal) -> Decimal {
        round_money(gross * self.exchange_commission_rate)
    }
}
