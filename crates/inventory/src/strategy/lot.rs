use stockledger_core::{DomainError, DomainResult};

use crate::stock::{InventoryAggregate, StockChange};

/// Adds to the bucket whose code matches exactly, opening it if absent.
pub(super) fn increase(code: &str, quantity: i64) -> Vec<StockChange> {
    vec![StockChange::LotIncreased {
        lot_code: code.to_string(),
        quantity,
    }]
}

pub(super) fn decrease(
    stock: &InventoryAggregate,
    code: &str,
    quantity: i64,
) -> DomainResult<Vec<StockChange>> {
    let available = stock.lot_batch(code).map_or(0, |batch| batch.quantity);
    if available < quantity {
        return Err(DomainError::insufficient(available, quantity));
    }

    Ok(vec![StockChange::LotDecreased {
        lot_code: code.to_string(),
        quantity,
    }])
}
