//! Stock ledger: the only writer of inventory aggregates.
//!
//! ```text
//! StockCommand
//!   ↓
//! 1. Load aggregate (or start empty)
//!   ↓
//! 2. Decide (pure `handle`) + location-wide serial check
//!   ↓
//! 3. Apply + save with ExpectedVersion::Exact (CAS)
//!   ↓  lost the race? reload and go again, up to `max_conflict_retries`
//! 4. Publish stock events
//! ```
//!
//! Calls for the same (product, location) are linearizable through the CAS.
//! Different pairs never contend.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use stockledger_catalog::{ProductId, TrackingType};
use stockledger_core::{Aggregate, AggregateRoot, DomainError, ExpectedVersion, LocationId};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    AvailableLot, DecreaseStock, ExpirationBatch, IncreaseStock, InventoryAggregate, StockCommand,
    StockEvent, StockKey, StockMovement,
};

use crate::config::LedgerConfig;
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::InventoryStore;

pub const STOCK_AGGREGATE_TYPE: &str = "inventory.stock";

/// Log target for internal invariant faults.
pub const INVARIANT_TARGET: &str = "stockledger::invariant";

#[derive(Debug)]
pub struct StockLedger<S, B> {
    store: S,
    bus: B,
    max_conflict_retries: u32,
}

impl<S, B> StockLedger<S, B> {
    pub fn new(store: S, bus: B, config: &LedgerConfig) -> Self {
        Self {
            store,
            bus,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> StockLedger<S, B>
where
    S: InventoryStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn increase(&self, command: IncreaseStock) -> ServiceResult<StockMovement> {
        self.execute(StockCommand::Increase(command))
    }

    pub fn decrease(&self, command: DecreaseStock) -> ServiceResult<StockMovement> {
        self.execute(StockCommand::Decrease(command))
    }

    /// Run one stock command to completion.
    ///
    /// Business rejections are returned as-is and never retried; only lost
    /// version races are.
    pub fn execute(&self, command: StockCommand) -> ServiceResult<StockMovement> {
        let key = command.key();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let mut stock = self
                .store
                .load(key)?
                .unwrap_or_else(|| InventoryAggregate::empty(key));
            let base_version = stock.version();

            let events = stock.handle(&command).map_err(|err| {
                if err.is_internal() {
                    tracing::error!(
                        target: INVARIANT_TARGET,
                        stock = %key,
                        code = err.code(),
                        error = %err,
                        "stock command hit an internal fault"
                    );
                }
                err
            })?;

            self.ensure_serials_free_at_location(&command)?;

            stock.apply_all(&events);

            match self.store.save(&stock, ExpectedVersion::Exact(base_version)) {
                Ok(()) => {
                    self.publish(key, base_version, &events);

                    let movement = StockMovement::from_events(&command, &events, stock.quantity());
                    tracing::info!(
                        stock = %key,
                        direction = ?movement.direction,
                        kind = ?movement.kind,
                        tracking_type = %movement.tracking_type,
                        quantity = movement.quantity,
                        resulting_quantity = movement.resulting_quantity,
                        "stock movement applied"
                    );
                    return Ok(movement);
                }
                Err(StoreError::Concurrency(reason)) => {
                    if attempts > self.max_conflict_retries {
                        return Err(ServiceError::RetriesExhausted {
                            aggregate: key.to_string(),
                            attempts,
                        });
                    }
                    tracing::debug!(stock = %key, attempts, %reason, "version race lost, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Serials entering stock must not be recorded under another product at
    /// the same location. The store re-checks on save under its own lock.
    fn ensure_serials_free_at_location(&self, command: &StockCommand) -> ServiceResult<()> {
        let StockCommand::Increase(cmd) = command else {
            return Ok(());
        };
        if cmd.tracking_type != TrackingType::Serialized {
            return Ok(());
        }

        for serial in &cmd.payload.serial_numbers {
            if let Some(holder) = self.store.serial_holder(cmd.key.location_id, serial)? {
                if holder != cmd.key {
                    return Err(DomainError::DuplicateSerial(serial.clone()).into());
                }
            }
        }
        Ok(())
    }

    /// Publication happens after the save; a failure here is logged and the
    /// movement still stands.
    fn publish(&self, key: StockKey, base_version: u64, events: &[StockEvent]) {
        for (sequence_number, event) in (base_version + 1..).zip(events) {
            let envelope = match EventEnvelope::from_typed(
                STOCK_AGGREGATE_TYPE,
                key.to_string(),
                sequence_number,
                event,
            ) {
                Ok(envelope) => envelope,
                Err(err) => {
                    tracing::warn!(stock = %key, error = %err, "stock event serialization failed");
                    continue;
                }
            };

            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(stock = %key, error = ?err, "stock event publication failed");
            }
        }
    }
}

impl<S, B> StockLedger<S, B>
where
    S: InventoryStore,
{
    /// Current aggregate state, if anything was ever stocked for the pair.
    pub fn stock(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> ServiceResult<Option<InventoryAggregate>> {
        Ok(self.store.load(StockKey::new(product_id, location_id))?)
    }

    /// 0 when nothing was ever stocked.
    pub fn available_quantity(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> ServiceResult<i64> {
        Ok(self
            .stock(product_id, location_id)?
            .map_or(0, |stock| stock.quantity()))
    }

    pub fn check_availability(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: i64,
    ) -> ServiceResult<bool> {
        Ok(self.available_quantity(product_id, location_id)? >= quantity)
    }

    pub fn available_serials(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> ServiceResult<Vec<String>> {
        Ok(self
            .stock(product_id, location_id)?
            .map(|stock| stock.available_serials())
            .unwrap_or_default())
    }

    pub fn available_lots(
        &self,
        product_id: ProductId,
        location_id: LocationId,
    ) -> ServiceResult<Vec<AvailableLot>> {
        Ok(self
            .stock(product_id, location_id)?
            .map(|stock| stock.available_lots())
            .unwrap_or_default())
    }

    /// Unexpired batches with stock on `today`, oldest expiration first.
    pub fn available_expiration_batches(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        today: NaiveDate,
    ) -> ServiceResult<Vec<ExpirationBatch>> {
        Ok(self
            .stock(product_id, location_id)?
            .map(|stock| stock.available_expiration_batches(today))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{DateTime, TimeZone, Utc};
    use stockledger_events::InMemoryEventBus;
    use stockledger_inventory::{BatchId, MovementKind, TrackingPayload};

    use super::*;
    use crate::store::InMemoryInventoryStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ledger() -> (StockLedger<InMemoryInventoryStore, Bus>, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let ledger = StockLedger::new(
            InMemoryInventoryStore::new(),
            bus.clone(),
            &LedgerConfig::default(),
        );
        (ledger, bus)
    }

    fn increase(key: StockKey, qty: i64, tt: TrackingType, payload: TrackingPayload) -> IncreaseStock {
        IncreaseStock {
            key,
            quantity: qty,
            tracking_type: tt,
            payload,
            kind: MovementKind::Issue,
            occurred_at: test_time(),
        }
    }

    fn decrease(key: StockKey, qty: i64, tt: TrackingType, payload: TrackingPayload) -> DecreaseStock {
        DecreaseStock {
            key,
            quantity: qty,
            tracking_type: tt,
            payload,
            kind: MovementKind::Issue,
            occurred_at: test_time(),
        }
    }

    fn test_key() -> StockKey {
        StockKey::new(ProductId::generate(), LocationId::new())
    }

    #[test]
    fn missing_aggregate_reports_zero() {
        let (ledger, _) = ledger();
        let key = test_key();

        assert_eq!(ledger.available_quantity(key.product_id, key.location_id).unwrap(), 0);
        assert!(!ledger.check_availability(key.product_id, key.location_id, 1).unwrap());
        assert!(ledger.available_serials(key.product_id, key.location_id).unwrap().is_empty());
    }

    #[test]
    fn movements_are_persisted_and_published() {
        let (ledger, bus) = ledger();
        let sub = bus.subscribe();
        let key = test_key();

        ledger
            .increase(increase(key, 20, TrackingType::Simple, TrackingPayload::none()))
            .unwrap();
        let movement = ledger
            .decrease(decrease(key, 5, TrackingType::Simple, TrackingPayload::none()))
            .unwrap();

        assert_eq!(movement.resulting_quantity, 15);
        assert_eq!(ledger.available_quantity(key.product_id, key.location_id).unwrap(), 15);
        assert!(ledger.check_availability(key.product_id, key.location_id, 15).unwrap());

        let published = sub.drain();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].event_type(), "inventory.stock.simple_increased");
        assert_eq!(published[1].sequence_number(), 2);
        assert_eq!(published[1].aggregate_key(), key.to_string());
    }

    #[test]
    fn rejected_movement_changes_nothing() {
        let (ledger, bus) = ledger();
        let sub = bus.subscribe();
        let key = test_key();

        ledger
            .increase(increase(key, 4, TrackingType::LotTracked, TrackingPayload::lot("L1")))
            .unwrap();
        let err = ledger
            .decrease(decrease(key, 10, TrackingType::LotTracked, TrackingPayload::lot("L1")))
            .unwrap_err();

        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        let lots = ledger.available_lots(key.product_id, key.location_id).unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, 4);
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn serials_are_unique_across_products_at_a_location() {
        let (ledger, _) = ledger();
        let location = LocationId::new();
        let phone = StockKey::new(ProductId::generate(), location);
        let tablet = StockKey::new(ProductId::generate(), location);

        ledger
            .increase(increase(phone, 1, TrackingType::Serialized, TrackingPayload::serials(["SN1"])))
            .unwrap();
        let err = ledger
            .increase(increase(tablet, 1, TrackingType::Serialized, TrackingPayload::serials(["SN1"])))
            .unwrap_err();

        assert_eq!(err, ServiceError::Domain(DomainError::DuplicateSerial("SN1".into())));
        assert!(ledger.stock(tablet.product_id, location).unwrap().is_none());
    }

    #[test]
    fn expiration_batches_are_listed_oldest_first_without_expired() {
        let (ledger, _) = ledger();
        let key = test_key();

        for (d, qty) in [(date(2025, 6, 1), 5), (date(2025, 1, 1), 5), (date(2024, 6, 1), 2)] {
            ledger
                .increase(increase(key, qty, TrackingType::Expirable, TrackingPayload::expiring(d)))
                .unwrap();
        }

        let batches = ledger
            .available_expiration_batches(key.product_id, key.location_id, date(2024, 12, 1))
            .unwrap();
        let dates: Vec<NaiveDate> = batches.iter().map(|b| b.expiration_date).collect();
        assert_eq!(dates, vec![date(2025, 1, 1), date(2025, 6, 1)]);
        assert_eq!(batches[0].id, BatchId(2));
    }

    /// Store that reports a version race a fixed number of times before
    /// delegating.
    struct Contended {
        inner: InMemoryInventoryStore,
        conflicts_left: AtomicU32,
    }

    impl InventoryStore for Contended {
        fn load(&self, key: StockKey) -> Result<Option<InventoryAggregate>, StoreError> {
            self.inner.load(key)
        }

        fn save(
            &self,
            aggregate: &InventoryAggregate,
            expected: ExpectedVersion,
        ) -> Result<(), StoreError> {
            let left = self.conflicts_left.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Concurrency("simulated".into()));
            }
            self.inner.save(aggregate, expected)
        }

        fn serial_holder(
            &self,
            location_id: LocationId,
            serial: &str,
        ) -> Result<Option<StockKey>, StoreError> {
            self.inner.serial_holder(location_id, serial)
        }
    }

    fn contended(conflicts: u32) -> StockLedger<Contended, Bus> {
        let config = LedgerConfig {
            max_conflict_retries: 2,
            ..LedgerConfig::default()
        };
        StockLedger::new(
            Contended {
                inner: InMemoryInventoryStore::new(),
                conflicts_left: AtomicU32::new(conflicts),
            },
            Arc::new(InMemoryEventBus::new()),
            &config,
        )
    }

    #[test]
    fn lost_races_are_retried() {
        let ledger = contended(2);
        let key = test_key();

        ledger
            .increase(increase(key, 3, TrackingType::Simple, TrackingPayload::none()))
            .unwrap();
        assert_eq!(ledger.available_quantity(key.product_id, key.location_id).unwrap(), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let ledger = contended(3);
        let key = test_key();

        let err = ledger
            .increase(increase(key, 3, TrackingType::Simple, TrackingPayload::none()))
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::RetriesExhausted {
                aggregate: key.to_string(),
                attempts: 3,
            }
        );
        assert_eq!(err.code(), "CONFLICT");
    }
}
