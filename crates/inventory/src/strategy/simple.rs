use stockledger_core::{DomainError, DomainResult};

use crate::stock::{InventoryAggregate, StockChange};

pub(super) fn increase(quantity: i64) -> Vec<StockChange> {
    vec![StockChange::SimpleIncreased { quantity }]
}

pub(super) fn decrease(stock: &InventoryAggregate, quantity: i64) -> DomainResult<Vec<StockChange>> {
    if quantity > stock.quantity() {
        return Err(DomainError::insufficient(stock.quantity(), quantity));
    }
    Ok(vec![StockChange::SimpleDecreased { quantity }])
}
