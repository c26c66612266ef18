//! Tracking payloads and their resolution against a product's tracking type.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockledger_catalog::TrackingType;
use stockledger_core::{DomainError, DomainResult, ValueObject};

/// Expiration batch identifier, local to one inventory aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Tracking details attached to a stock movement or a document line.
///
/// Carries the union of every discipline's fields. Only the fields relevant
/// to the product's [`TrackingType`] are read; the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial_numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_batch_id: Option<BatchId>,
}

impl ValueObject for TrackingPayload {}

impl TrackingPayload {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn serials<I, S>(serials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            serial_numbers: serials.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn lot(code: impl Into<String>) -> Self {
        Self {
            lot_code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn expiring(date: NaiveDate) -> Self {
        Self {
            expiration_date: Some(date),
            ..Self::default()
        }
    }

    pub fn batch(id: BatchId) -> Self {
        Self {
            expiration_batch_id: Some(id),
            ..Self::default()
        }
    }

    /// The lot code, unless missing or blank. Matching stays exact.
    pub fn non_blank_lot_code(&self) -> Option<&str> {
        self.lot_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
    }
}

/// A payload narrowed to the one discipline that applies.
///
/// Strategies dispatch on this closed set instead of re-inspecting the
/// optional fields of [`TrackingPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingSpec<'a> {
    Simple,
    Serialized {
        serials: &'a [String],
    },
    Lot {
        code: &'a str,
    },
    Expirable {
        date: Option<NaiveDate>,
        batch: Option<BatchId>,
    },
}

impl<'a> TrackingSpec<'a> {
    /// Narrow `payload` to the fields `tracking_type` needs.
    ///
    /// Only the lot code is mandatory at this stage. Serial counts and
    /// expirable targeting depend on direction and are checked by the
    /// strategies.
    pub fn resolve(tracking_type: TrackingType, payload: &'a TrackingPayload) -> DomainResult<Self> {
        match tracking_type {
            TrackingType::Simple => Ok(TrackingSpec::Simple),
            TrackingType::Serialized => Ok(TrackingSpec::Serialized {
                serials: &payload.serial_numbers,
            }),
            TrackingType::LotTracked => {
                let code = payload
                    .non_blank_lot_code()
                    .ok_or_else(|| DomainError::payload_invalid("lot code is required"))?;
                Ok(TrackingSpec::Lot { code })
            }
            TrackingType::Expirable => Ok(TrackingSpec::Expirable {
                date: payload.expiration_date,
                batch: payload.expiration_batch_id,
            }),
        }
    }

    pub fn tracking_type(&self) -> TrackingType {
        match self {
            TrackingSpec::Simple => TrackingType::Simple,
            TrackingSpec::Serialized { .. } => TrackingType::Serialized,
            TrackingSpec::Lot { .. } => TrackingType::LotTracked,
            TrackingSpec::Expirable { .. } => TrackingType::Expirable,
        }
    }
}
