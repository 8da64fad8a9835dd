//! Exchange-rate provider with caching and a deterministic fallback chain
//!
//! The provider keeps one in-memory base-relative rate table with a fixed
//! expiry window. On miss or expiry it attempts a live fetch through its
//! [`QuoteSource`]; on failure it degrades to the most recently cached
//! table, and finally to the embedded static table. Degrading is the sole
//! intentional no-error path in the crate: conversion never raises unless
//! a rate is missing from every fallback, which the static table prevents.
//!
//! Every conversion performed on behalf of a fee computation persists an
//! [`ExchangeRateSnapshot`] so the fee's provenance stays auditable.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::snapshot::{Conversion, ExchangeRateSnapshot, RateProvenance};
use super::source::{static_rates, QuoteSource};
use crate::types::{Currency, LedgerError, Result, SnapshotId};

/// Fixed expiry window for the cached rate table
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cached rate table with its refresh time and provenance
#[derive(Clone)]
struct RateCache {
    rates: HashMap<Currency, Decimal>,
    refreshed_at: Instant,
    provenance: RateProvenance,
}

/// Supplies conversion rates between supported currencies
///
/// Thread-safe: the cache and the snapshot journal sit behind locks, so
/// one provider is shared by all processor calls.
pub struct RateProvider {
    source: Box<dyn QuoteSource>,
    ttl: Duration,
    cache: RwLock<Option<RateCache>>,
    snapshots: RwLock<Vec<ExchangeRateSnapshot>>,
    next_snapshot_id: AtomicU64,
}

impl RateProvider {
    /// Create a provider over the given quote source with the standard
    /// five-minute cache window
    pub fn new(source: Box<dyn QuoteSource>) -> Self {
        Self::with_ttl(source, CACHE_TTL)
    }

    /// Create a provider with a custom cache window
    pub fn with_ttl(source: Box<dyn QuoteSource>, ttl: Duration) -> Self {
        RateProvider {
            source,
            ttl,
            cache: RwLock::new(None),
            snapshots: RwLock::new(Vec::new()),
            next_snapshot_id: AtomicU64::new(1),
        }
    }

    /// Current conversion rate, in units of `to` per unit of `from`
    ///
    /// Returns 1 for equal currencies without consulting any source.
    /// Cross rates between two non-base currencies are the ratio of their
    /// base-relative rates.
    pub fn rate(&self, from: Currency, to: Currency) -> Result<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let (table, _) = self.current_table();
        Self::cross_rate(&table, from, to)
    }

    /// Base-relative rates for all supported currencies
    ///
    /// Used for display and bulk conversion. Infallible: the fallback
    /// chain always yields a table.
    pub fn all_rates(&self) -> HashMap<Currency, Decimal> {
        self.current_table().0
    }

    /// Convert an amount between currencies
    ///
    /// The result is tagged with the rate and its provenance; no snapshot
    /// is persisted. Use [`RateProvider::convert_recorded`] for fee
    /// conversions that must be auditable.
    pub fn convert(&self, amount: Decimal, from: Currency, to: Currency) -> Result<Conversion> {
        if from == to {
            return Ok(Conversion::identity(amount));
        }
        let (table, provenance) = self.current_table();
        let rate = Self::cross_rate(&table, from, to)?;
        let converted = amount
            .checked_mul(rate)
            .ok_or_else(|| LedgerError::conversion_overflow(amount, from, to))?;
        Ok(Conversion {
            amount: converted,
            rate,
            provenance,
            snapshot: None,
        })
    }

    /// Convert an amount and persist the rate table used
    ///
    /// Every fee conversion goes through here so the fee's pricing can be
    /// audited later, fallback tables included.
    pub fn convert_recorded(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> Result<Conversion> {
        if from == to {
            return Ok(Conversion::identity(amount));
        }
        let (table, provenance) = self.current_table();
        let rate = Self::cross_rate(&table, from, to)?;
        // Fail before persisting anything if the product is unrepresentable.
        let converted = amount
            .checked_mul(rate)
            .ok_or_else(|| LedgerError::conversion_overflow(amount, from, to))?;
        let snapshot_id = self.persist_snapshot(table, provenance);
        Ok(Conversion {
            amount: converted,
            rate,
            provenance,
            snapshot: Some(snapshot_id),
        })
    }

    /// Persist and return a snapshot of the current rate table
    ///
    /// Exchange operations call this to attach a snapshot reference to
    /// the transaction they record.
    pub fn record_snapshot(&self) -> ExchangeRateSnapshot {
        let (table, provenance) = self.current_table();
        let id = self.persist_snapshot(table, provenance);
        // The snapshot was just appended under this id.
        self.snapshot(id).unwrap_or_else(|| ExchangeRateSnapshot {
            id,
            taken_at: Utc::now(),
            rates: HashMap::new(),
            provenance,
        })
    }

    /// Look up a previously persisted snapshot
    pub fn snapshot(&self, id: SnapshotId) -> Option<ExchangeRateSnapshot> {
        let snapshots = self
            .snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshots.iter().find(|s| s.id == id).cloned()
    }

    /// All persisted snapshots, oldest first
    pub fn snapshots(&self) -> Vec<ExchangeRateSnapshot> {
        self.snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Resolve the current rate table through the fallback chain
    ///
    /// Fresh cache -> live fetch -> stale cache -> static table. A table
    /// served from a stale cache or the static table is marked Fallback.
    fn current_table(&self) -> (HashMap<Currency, Decimal>, RateProvenance) {
        {
            let cache = self
                .cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(cached) = cache.as_ref() {
                if cached.refreshed_at.elapsed() < self.ttl {
                    return (cached.rates.clone(), cached.provenance);
                }
            }
        }

        match self.source.fetch_rates() {
            Ok(rates) => {
                let mut cache = self
                    .cache
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *cache = Some(RateCache {
                    rates: rates.clone(),
                    refreshed_at: Instant::now(),
                    provenance: RateProvenance::Live,
                });
                (rates, RateProvenance::Live)
            }
            Err(err) => {
                let cache = self
                    .cache
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                match cache.as_ref() {
                    Some(cached) => {
                        log::warn!(
                            "live quote fetch failed ({}), reusing cached rates",
                            err
                        );
                        (cached.rates.clone(), RateProvenance::Fallback)
                    }
                    None => {
                        log::warn!(
                            "live quote fetch failed ({}) with no cached rates, using static table",
                            err
                        );
                        (static_rates(), RateProvenance::Fallback)
                    }
                }
            }
        }
    }

    /// Rate as the ratio of the two base-relative rates
    fn cross_rate(
        table: &HashMap<Currency, Decimal>,
        from: Currency,
        to: Currency,
    ) -> Result<Decimal> {
        let base_per_from = table
            .get(&from)
            .copied()
            .ok_or_else(|| LedgerError::rate_unavailable(from, to))?;
        let base_per_to = table
            .get(&to)
            .copied()
            .ok_or_else(|| LedgerError::rate_unavailable(from, to))?;
        if base_per_to.is_zero() {
            return Err(LedgerError::rate_unavailable(from, to));
        }
        Ok(base_per_from / base_per_to)
    }

    fn persist_snapshot(
        &self,
        rates: HashMap<Currency, Decimal>,
        provenance: RateProvenance,
    ) -> SnapshotId {
        let id = self.next_snapshot_id.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self
            .snapshots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshots.push(ExchangeRateSnapshot {
            id,
            taken_at: Utc::now(),
            rates,
            provenance,
        });
        id
    }
}
