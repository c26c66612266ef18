use chrono::NaiveDate;

use stockledger_core::{DomainError, DomainResult};

use crate::stock::{InventoryAggregate, MovementKind, StockChange};
use crate::tracking::BatchId;

/// Tops up the batch with the same date, or opens a new one.
///
/// Without a date the payload must name an existing batch.
pub(super) fn increase(
    stock: &InventoryAggregate,
    date: Option<NaiveDate>,
    batch: Option<BatchId>,
    quantity: i64,
) -> DomainResult<Vec<StockChange>> {
    if let Some(expiration_date) = date {
        let existing = stock
            .expiration_batches()
            .iter()
            .find(|b| b.expiration_date == expiration_date);

        return Ok(vec![match existing {
            Some(b) => StockChange::ExpirationBatchIncreased {
                batch_id: b.id,
                expiration_date,
                quantity,
            },
            None => StockChange::ExpirationBatchOpened {
                batch_id: stock.next_batch_id(),
                expiration_date,
                quantity,
            },
        }]);
    }

    let Some(id) = batch else {
        return Err(DomainError::payload_invalid("expiration date is required"));
    };
    let target = stock
        .expiration_batch(id)
        .ok_or_else(|| DomainError::payload_invalid(format!("unknown expiration batch {id}")))?;

    Ok(vec![StockChange::ExpirationBatchIncreased {
        batch_id: target.id,
        expiration_date: target.expiration_date,
        quantity,
    }])
}

/// Draws from the named batch, or FIFO from the earliest-expiring one.
///
/// Only reversals may draw from an expired batch.
pub(super) fn decrease(
    stock: &InventoryAggregate,
    batch: Option<BatchId>,
    quantity: i64,
    kind: MovementKind,
    today: NaiveDate,
) -> DomainResult<Vec<StockChange>> {
    let target = match batch {
        Some(id) => stock.expiration_batch(id),
        None => stock.first_to_expire(),
    }
    .ok_or_else(|| DomainError::insufficient(0, quantity))?;

    if target.quantity < quantity {
        return Err(DomainError::insufficient(target.quantity, quantity));
    }

    if kind == MovementKind::Issue && target.is_expired(today) {
        return Err(DomainError::ExpiredBatch {
            batch: target.id.0,
            expired_on: target.expiration_date,
        });
    }

    Ok(vec![StockChange::ExpirationBatchDecreased {
        batch_id: target.id,
        expiration_date: target.expiration_date,
        quantity,
    }])
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use stockledger_catalog::{ProductId, TrackingType};
    use stockledger_core::{Aggregate, LocationId};

    use crate::stock::{IncreaseStock, StockCommand, StockKey};
    use crate::tracking::TrackingPayload;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stocked(batches: &[(NaiveDate, i64)]) -> InventoryAggregate {
        let key = StockKey::new(ProductId::generate(), LocationId::new());
        let mut stock = InventoryAggregate::empty(key);
        for (expiration_date, quantity) in batches {
            let events = stock
                .handle(&StockCommand::Increase(IncreaseStock {
                    key,
                    quantity: *quantity,
                    tracking_type: TrackingType::Expirable,
                    payload: TrackingPayload::expiring(*expiration_date),
                    kind: MovementKind::Issue,
                    occurred_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                }))
                .unwrap();
            stock.apply_all(&events);
        }
        stock
    }

    #[test]
    fn same_date_tops_up_existing_batch() {
        let stock = stocked(&[(date(2025, 1, 1), 5)]);
        let changes = increase(&stock, Some(date(2025, 1, 1)), None, 2).unwrap();
        assert_eq!(
            changes,
            vec![StockChange::ExpirationBatchIncreased {
                batch_id: BatchId(1),
                expiration_date: date(2025, 1, 1),
                quantity: 2,
            }]
        );
    }

    #[test]
    fn increase_needs_date_or_known_batch() {
        let stock = stocked(&[(date(2025, 1, 1), 5)]);

        let err = increase(&stock, None, None, 1).unwrap_err();
        assert_eq!(err.code(), "TRACKING_PAYLOAD_INVALID");

        let err = increase(&stock, None, Some(BatchId(42)), 1).unwrap_err();
        assert_eq!(err.code(), "TRACKING_PAYLOAD_INVALID");

        assert!(increase(&stock, None, Some(BatchId(1)), 1).is_ok());
    }

    #[test]
    fn fifo_skips_empty_batches() {
        let mut stock = stocked(&[(date(2025, 1, 1), 2), (date(2025, 6, 1), 5)]);
        let changes = decrease(&stock, None, 2, MovementKind::Issue, date(2024, 12, 1)).unwrap();
        let events = changes_to_events(&stock, changes);
        stock.apply_all(&events);

        let changes = decrease(&stock, None, 1, MovementKind::Issue, date(2024, 12, 1)).unwrap();
        assert_eq!(
            changes,
            vec![StockChange::ExpirationBatchDecreased {
                batch_id: BatchId(2),
                expiration_date: date(2025, 6, 1),
                quantity: 1,
            }]
        );
    }

    #[test]
    fn short_batch_is_insufficient_even_when_total_suffices() {
        let stock = stocked(&[(date(2025, 1, 1), 2), (date(2025, 6, 1), 5)]);
        let err = decrease(&stock, None, 3, MovementKind::Issue, date(2024, 12, 1)).unwrap_err();
        assert_eq!(err, DomainError::insufficient(2, 3));

        let err = decrease(&stock, Some(BatchId(7)), 1, MovementKind::Issue, date(2024, 12, 1))
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient(0, 1));
    }

    #[test]
    fn expired_batch_is_only_released_by_reversal() {
        let stock = stocked(&[(date(2025, 1, 1), 5)]);
        let today = date(2025, 1, 2);

        let err = decrease(&stock, None, 1, MovementKind::Issue, today).unwrap_err();
        assert_eq!(
            err,
            DomainError::ExpiredBatch {
                batch: 1,
                expired_on: date(2025, 1, 1)
            }
        );

        let err = decrease(&stock, Some(BatchId(1)), 1, MovementKind::Issue, today).unwrap_err();
        assert_eq!(err.code(), "EXPIRED_BATCH");

        assert!(decrease(&stock, Some(BatchId(1)), 5, MovementKind::Reversal, today).is_ok());
    }

    fn changes_to_events(
        stock: &InventoryAggregate,
        changes: Vec<StockChange>,
    ) -> Vec<crate::stock::StockEvent> {
        changes
            .into_iter()
            .map(|change| crate::stock::StockEvent {
                key: stock.key(),
                change,
                occurred_at: Utc::now(),
            })
            .collect()
    }
}
