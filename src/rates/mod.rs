//! Exchange-rate provider module
//!
//! - `provider` - cached rate lookups with the live -> cached -> static
//!   fallback chain
//! - `source` - the `QuoteSource` trait, HTTP implementation, and the
//!   embedded static table
//! - `snapshot` - immutable rate snapshots and tagged conversion results

pub mod provider;
pub mod snapshot;
pub mod source;

pub use provider::{RateProvider, CACHE_TTL};
pub use snapshot::{Conversion, ExchangeRateSnapshot, RateProvenance};
pub use source::{static_rates, HttpQuoteSource, QuoteError, QuoteSource, QUOTE_FETCH_TIMEOUT};
