//! Quote sources for the exchange-rate provider
//!
//! The provider consults a [`QuoteSource`] on every cache miss or expiry.
//! The production implementation is [`HttpQuoteSource`], a blocking HTTP
//! client with a bounded timeout; tests substitute their own sources.
//! The embedded [`static_rates`] table is the terminal fallback and is
//! the reason `RateUnavailable` is effectively unreachable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::types::Currency;

/// Bound on the live quote fetch; after this the provider falls back
/// rather than stalling the processor.
pub const QUOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Error raised by a quote source
///
/// Never escapes the provider: every source failure degrades through the
/// fallback chain.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// Transport-level failure (timeout, DNS, non-2xx status)
    #[error("quote fetch failed: {0}")]
    Fetch(String),

    /// The response decoded but did not contain a usable rate table
    #[error("malformed quote payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for QuoteError {
    fn from(err: reqwest::Error) -> Self {
        QuoteError::Fetch(err.to_string())
    }
}

/// A source of base-relative exchange rates
///
/// Implementations return units of base currency per unit of foreign
/// currency for every currency they can quote. Missing currencies are
/// tolerated; the provider keeps fallback values for them.
pub trait QuoteSource: Send + Sync {
    /// Fetch the current base-relative rate table
    fn fetch_rates(&self) -> Result<HashMap<Currency, Decimal>, QuoteError>;
}

/// Wire payload expected from the quote endpoint
///
/// `rates` maps ISO currency codes to units of base currency per unit of
/// that currency. Unknown codes are skipped; the base currency is pinned
/// to 1 regardless of the payload.
#[derive(Debug, serde::Deserialize)]
struct QuotePayload {
    rates: HashMap<String, Decimal>,
}

/// Blocking HTTP quote source
///
/// The endpoint is replaceable per deployment; only the payload shape is
/// fixed. The underlying client enforces [`QUOTE_FETCH_TIMEOUT`].
pub struct HttpQuoteSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpQuoteSource {
    /// Create a source that fetches quotes from `url`
    pub fn new(url: impl Into<String>) -> Result<Self, QuoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(QUOTE_FETCH_TIMEOUT)
            .build()?;
        Ok(HttpQuoteSource {
            client,
            url: url.into(),
        })
    }
}

impl QuoteSource for HttpQuoteSource {
    fn fetch_rates(&self) -> Result<HashMap<Currency, Decimal>, QuoteError> {
        let payload: QuotePayload = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .json()?;

        let mut rates = HashMap::new();
        for (code, rate) in payload.rates {
            match Currency::from_str(&code) {
                Ok(currency) => {
                    if rate <= Decimal::ZERO {
                        return Err(QuoteError::Malformed(format!(
                            "non-positive rate {} for {}",
                            rate, code
                        )));
                    }
                    rates.insert(currency, rate);
                }
                // Quote feeds carry many currencies we do not hold.
                Err(_) => continue,
            }
        }

        if rates.is_empty() {
            return Err(QuoteError::Malformed(
                "payload contained no supported currencies".to_string(),
            ));
        }

        rates.insert(Currency::BASE, Decimal::ONE);
        Ok(rates)
    }
}

/// Embedded static rate table, the terminal fallback
///
/// Used only when no live fetch has ever succeeded and no cached table
/// exists. Values are maintained by hand and cover every supported
/// currency, so a conversion can always be priced.
pub fn static_rates() -> HashMap<Currency, Decimal> {
    HashMap::from([
        (Currency::Try, Decimal::ONE),
        (Currency::Usd, dec!(41.20)),
        (Currency::Eur, dec!(47.85)),
        (Currency::Gbp, dec!(55.30)),
        (Currency::Chf, dec!(51.10)),
    ])
}
