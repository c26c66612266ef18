//! One increase/decrease algorithm per tracking discipline.
//!
//! Strategies only decide. They read the aggregate and return the changes to
//! apply, or the first rule the movement breaks.

mod expirable;
mod lot;
mod serialized;
mod simple;

use chrono::NaiveDate;

use stockledger_core::DomainResult;

use crate::stock::{InventoryAggregate, MovementKind, StockChange};
use crate::tracking::TrackingSpec;

pub(crate) fn plan_increase(
    stock: &InventoryAggregate,
    spec: TrackingSpec<'_>,
    quantity: i64,
    kind: MovementKind,
) -> DomainResult<Vec<StockChange>> {
    match spec {
        TrackingSpec::Simple => Ok(simple::increase(quantity)),
        TrackingSpec::Serialized { serials } => {
            serialized::increase(stock, serials, quantity, kind)
        }
        TrackingSpec::Lot { code } => Ok(lot::increase(code, quantity)),
        TrackingSpec::Expirable { date, batch } => expirable::increase(stock, date, batch, quantity),
    }
}

pub(crate) fn plan_decrease(
    stock: &InventoryAggregate,
    spec: TrackingSpec<'_>,
    quantity: i64,
    kind: MovementKind,
    today: NaiveDate,
) -> DomainResult<Vec<StockChange>> {
    match spec {
        TrackingSpec::Simple => simple::decrease(stock, quantity),
        TrackingSpec::Serialized { serials } => serialized::decrease(stock, serials, quantity, kind),
        TrackingSpec::Lot { code } => lot::decrease(stock, code, quantity),
        // The payload date is not a selector on the way out.
        TrackingSpec::Expirable { batch, .. } => {
            expirable::decrease(stock, batch, quantity, kind, today)
        }
    }
}
