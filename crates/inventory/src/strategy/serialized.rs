use std::collections::HashSet;

use stockledger_core::{DomainError, DomainResult};

use crate::stock::{InventoryAggregate, MovementKind, StockChange};

fn ensure_count(serials: &[String], quantity: i64) -> DomainResult<()> {
    if serials.len() as i64 != quantity {
        return Err(DomainError::SerialCountMismatch {
            expected: quantity,
            actual: serials.len(),
        });
    }
    Ok(())
}

/// Receives new units, or puts sold units back on a reversal.
///
/// An issue accepts only serials this aggregate has never recorded. A
/// reversal accepts only serials it holds as sold. Serials held by other
/// products at the same location are checked by the store.
pub(super) fn increase(
    stock: &InventoryAggregate,
    serials: &[String],
    quantity: i64,
    kind: MovementKind,
) -> DomainResult<Vec<StockChange>> {
    ensure_count(serials, quantity)?;

    let mut seen = HashSet::with_capacity(serials.len());
    let mut received = Vec::new();
    let mut restored = Vec::new();

    for serial in serials {
        if !seen.insert(serial.as_str()) {
            return Err(DomainError::DuplicateSerial(serial.clone()));
        }
        match (kind, stock.serial_unit(serial)) {
            (MovementKind::Issue, None) => received.push(serial.clone()),
            (MovementKind::Issue, Some(_)) => {
                return Err(DomainError::DuplicateSerial(serial.clone()));
            }
            (MovementKind::Reversal, Some(unit)) if unit.is_sold => restored.push(serial.clone()),
            (MovementKind::Reversal, Some(_)) => {
                return Err(DomainError::DuplicateSerial(serial.clone()));
            }
            (MovementKind::Reversal, None) => {
                return Err(DomainError::SerialNotAvailable(serial.clone()));
            }
        }
    }

    let mut changes = Vec::with_capacity(2);
    if !received.is_empty() {
        changes.push(StockChange::SerialUnitsReceived { serials: received });
    }
    if !restored.is_empty() {
        changes.push(StockChange::SerialUnitsRestored { serials: restored });
    }
    Ok(changes)
}

/// Takes each listed unit out of stock.
///
/// An issue marks the units sold. A reversal drops their records so a
/// cancelled receipt leaves no trace.
pub(super) fn decrease(
    stock: &InventoryAggregate,
    serials: &[String],
    quantity: i64,
    kind: MovementKind,
) -> DomainResult<Vec<StockChange>> {
    ensure_count(serials, quantity)?;

    let mut seen = HashSet::with_capacity(serials.len());
    for serial in serials {
        let in_stock = stock.serial_unit(serial).is_some_and(|unit| !unit.is_sold);
        if !in_stock || !seen.insert(serial.as_str()) {
            return Err(DomainError::SerialNotAvailable(serial.clone()));
        }
    }

    let serials = serials.to_vec();
    Ok(vec![match kind {
        MovementKind::Issue => StockChange::SerialUnitsSold { serials },
        MovementKind::Reversal => StockChange::SerialUnitsRemoved { serials },
    }])
}
