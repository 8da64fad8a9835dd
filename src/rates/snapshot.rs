//! Exchange-rate snapshots and tagged conversion results
//!
//! A snapshot freezes the full base-relative rate table at a point in
//! time together with its provenance, so every fee conversion remains
//! auditable even when the fallback table priced it. Snapshots are
//! immutable: a new one supersedes, never edits, prior ones.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Currency, SnapshotId};

/// Where a rate table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateProvenance {
    /// Freshly fetched from the live quote source
    Live,
    /// A stale cached table or the embedded static table
    Fallback,
}

/// An immutable record of the rate table used for a conversion
///
/// Rates are expressed as units of base currency per unit of foreign
/// currency; the base currency itself maps to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSnapshot {
    /// Unique snapshot identifier
    pub id: SnapshotId,

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,

    /// Base-relative rate per supported currency
    pub rates: HashMap<Currency, Decimal>,

    /// Whether the table came from the live source or a fallback
    pub provenance: RateProvenance,
}

/// The tagged result of a currency conversion
///
/// Callers and auditors can distinguish live from fallback pricing; a
/// bare number never leaves the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Converted amount
    pub amount: Decimal,

    /// Rate applied, in target units per source unit
    pub rate: Decimal,

    /// Provenance of the rate table used
    pub provenance: RateProvenance,

    /// Snapshot persisted for this conversion, when recorded
    pub snapshot: Option<SnapshotId>,
}

impl Conversion {
    /// A degenerate conversion between equal currencies
    ///
    /// No source is consulted and no snapshot is recorded; the rate is 1
    /// and provenance is reported as live because no fallback was
    /// involved.
    pub fn identity(amount: Decimal) -> Self {
        Conversion {
            amount,
            rate: Decimal::ONE,
            provenance: RateProvenance::Live,
            snapshot: None,
        }
    }
}
