use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockledger_catalog::{ProductId, TrackingType};
use stockledger_core::{Aggregate, AggregateRoot, DomainError, LocationId};
use stockledger_events::Event;

use crate::strategy;
use crate::tracking::{BatchId, TrackingPayload, TrackingSpec};
use crate::units::{ExpirationBatch, LotBatch, SerialUnit};

/// Identity of an inventory aggregate: one per (product, location) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub location_id: LocationId,
}

impl StockKey {
    pub fn new(product_id: ProductId, location_id: LocationId) -> Self {
        Self {
            product_id,
            location_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.location_id)
    }
}

/// Whether a movement moves stock in or out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockDirection {
    Increase,
    Decrease,
}

impl StockDirection {
    pub fn inverse(self) -> Self {
        match self {
            StockDirection::Increase => StockDirection::Decrease,
            StockDirection::Decrease => StockDirection::Increase,
        }
    }
}

/// Why a movement happens.
///
/// `Reversal` undoes an earlier `Issue` (document cancellation). It may consume
/// expired batches, and a serialized reversal-decrease drops the unit records
/// instead of marking them sold.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    #[default]
    Issue,
    Reversal,
}

/// Aggregate root: InventoryAggregate.
///
/// Which sub-collection is populated depends on the tracking type callers pass
/// with each command; the aggregate does not store it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAggregate {
    key: StockKey,
    quantity: i64,
    serial_units: BTreeMap<String, SerialUnit>,
    lot_batches: BTreeMap<String, LotBatch>,
    expiration_batches: Vec<ExpirationBatch>,
    next_batch_no: u64,
    version: u64,
}

/// Lot code with a positive quantity on hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableLot {
    pub lot_code: String,
    pub quantity: i64,
    pub received_at: DateTime<Utc>,
}

impl InventoryAggregate {
    /// Create an empty, not-yet-stocked aggregate instance for rehydration.
    pub fn empty(key: StockKey) -> Self {
        Self {
            key,
            quantity: 0,
            serial_units: BTreeMap::new(),
            lot_batches: BTreeMap::new(),
            expiration_batches: Vec::new(),
            next_batch_no: 1,
            version: 0,
        }
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// True until the first event has been applied.
    pub fn is_new(&self) -> bool {
        self.version == 0
    }

    pub fn serial_unit(&self, serial: &str) -> Option<&SerialUnit> {
        self.serial_units.get(serial)
    }

    /// Every serial this aggregate holds a record for, sold or not.
    pub fn serial_numbers(&self) -> impl Iterator<Item = &str> {
        self.serial_units.keys().map(String::as_str)
    }

    pub fn available_serials(&self) -> Vec<String> {
        self.serial_units
            .values()
            .filter(|unit| !unit.is_sold)
            .map(|unit| unit.serial_number.clone())
            .collect()
    }

    pub fn lot_batch(&self, code: &str) -> Option<&LotBatch> {
        self.lot_batches.get(code)
    }

    pub fn available_lots(&self) -> Vec<AvailableLot> {
        self.lot_batches
            .iter()
            .filter(|(_, batch)| batch.quantity > 0)
            .map(|(code, batch)| AvailableLot {
                lot_code: code.clone(),
                quantity: batch.quantity,
                received_at: batch.received_at,
            })
            .collect()
    }

    pub fn expiration_batch(&self, id: BatchId) -> Option<&ExpirationBatch> {
        self.expiration_batches.iter().find(|batch| batch.id == id)
    }

    pub fn expiration_batches(&self) -> &[ExpirationBatch] {
        &self.expiration_batches
    }

    /// Sellable batches on `today`, oldest expiration first.
    pub fn available_expiration_batches(&self, today: NaiveDate) -> Vec<ExpirationBatch> {
        let mut batches: Vec<ExpirationBatch> = self
            .expiration_batches
            .iter()
            .filter(|batch| batch.quantity > 0 && !batch.is_expired(today))
            .cloned()
            .collect();
        batches.sort_by_key(|batch| (batch.expiration_date, batch.id));
        batches
    }

    /// Earliest-expiring batch with stock, ties broken by creation order.
    pub fn first_to_expire(&self) -> Option<&ExpirationBatch> {
        self.expiration_batches
            .iter()
            .filter(|batch| batch.quantity > 0)
            .min_by_key(|batch| (batch.expiration_date, batch.id))
    }

    pub(crate) fn next_batch_id(&self) -> BatchId {
        BatchId(self.next_batch_no)
    }

    /// Units held by whichever sub-collection is in use.
    ///
    /// Equals `quantity` for every reachable state.
    pub fn active_units(&self) -> i64 {
        let serial = self.serial_units.values().filter(|u| !u.is_sold).count() as i64;
        let lots: i64 = self.lot_batches.values().map(|b| b.quantity).sum();
        let batches: i64 = self.expiration_batches.iter().map(|b| b.quantity).sum();

        match self.discipline() {
            Some(TrackingType::Serialized) => serial,
            Some(TrackingType::LotTracked) => lots,
            Some(TrackingType::Expirable) => batches,
            Some(TrackingType::Simple) | None => self.quantity,
        }
    }

    /// The discipline this aggregate's state was built with, if any.
    pub fn discipline(&self) -> Option<TrackingType> {
        if !self.serial_units.is_empty() {
            Some(TrackingType::Serialized)
        } else if !self.lot_batches.is_empty() {
            Some(TrackingType::LotTracked)
        } else if !self.expiration_batches.is_empty() {
            Some(TrackingType::Expirable)
        } else if self.quantity != 0 {
            Some(TrackingType::Simple)
        } else {
            None
        }
    }
}

impl AggregateRoot for InventoryAggregate {
    type Id = StockKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IncreaseStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncreaseStock {
    pub key: StockKey,
    pub quantity: i64,
    pub tracking_type: TrackingType,
    pub payload: TrackingPayload,
    pub kind: MovementKind,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DecreaseStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecreaseStock {
    pub key: StockKey,
    pub quantity: i64,
    pub tracking_type: TrackingType,
    pub payload: TrackingPayload,
    pub kind: MovementKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    Increase(IncreaseStock),
    Decrease(DecreaseStock),
}

impl StockCommand {
    pub fn key(&self) -> StockKey {
        match self {
            StockCommand::Increase(cmd) => cmd.key,
            StockCommand::Decrease(cmd) => cmd.key,
        }
    }

    pub fn direction(&self) -> StockDirection {
        match self {
            StockCommand::Increase(_) => StockDirection::Increase,
            StockCommand::Decrease(_) => StockDirection::Decrease,
        }
    }

    pub fn quantity(&self) -> i64 {
        match self {
            StockCommand::Increase(cmd) => cmd.quantity,
            StockCommand::Decrease(cmd) => cmd.quantity,
        }
    }

    pub fn tracking_type(&self) -> TrackingType {
        match self {
            StockCommand::Increase(cmd) => cmd.tracking_type,
            StockCommand::Decrease(cmd) => cmd.tracking_type,
        }
    }

    pub fn kind(&self) -> MovementKind {
        match self {
            StockCommand::Increase(cmd) => cmd.kind,
            StockCommand::Decrease(cmd) => cmd.kind,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockCommand::Increase(cmd) => cmd.occurred_at,
            StockCommand::Decrease(cmd) => cmd.occurred_at,
        }
    }
}

/// A single change to one sub-collection (or to the plain quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StockChange {
    SimpleIncreased {
        quantity: i64,
    },
    SimpleDecreased {
        quantity: i64,
    },
    SerialUnitsReceived {
        serials: Vec<String>,
    },
    /// Previously sold units returned to stock.
    SerialUnitsRestored {
        serials: Vec<String>,
    },
    SerialUnitsSold {
        serials: Vec<String>,
    },
    /// Unit records dropped by a reversal.
    SerialUnitsRemoved {
        serials: Vec<String>,
    },
    LotIncreased {
        lot_code: String,
        quantity: i64,
    },
    LotDecreased {
        lot_code: String,
        quantity: i64,
    },
    ExpirationBatchOpened {
        batch_id: BatchId,
        expiration_date: NaiveDate,
        quantity: i64,
    },
    ExpirationBatchIncreased {
        batch_id: BatchId,
        expiration_date: NaiveDate,
        quantity: i64,
    },
    ExpirationBatchDecreased {
        batch_id: BatchId,
        expiration_date: NaiveDate,
        quantity: i64,
    },
}

impl StockChange {
    /// Signed effect on the aggregate's top-level quantity.
    pub fn delta(&self) -> i64 {
        match self {
            StockChange::SimpleIncreased { quantity }
            | StockChange::LotIncreased { quantity, .. }
            | StockChange::ExpirationBatchOpened { quantity, .. }
            | StockChange::ExpirationBatchIncreased { quantity, .. } => *quantity,
            StockChange::SimpleDecreased { quantity }
            | StockChange::LotDecreased { quantity, .. }
            | StockChange::ExpirationBatchDecreased { quantity, .. } => -*quantity,
            StockChange::SerialUnitsReceived { serials }
            | StockChange::SerialUnitsRestored { serials } => serials.len() as i64,
            StockChange::SerialUnitsSold { serials }
            | StockChange::SerialUnitsRemoved { serials } => -(serials.len() as i64),
        }
    }
}

/// Event: a stock change applied to one aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEvent {
    pub key: StockKey,
    pub change: StockChange,
    pub occurred_at: DateTime<Utc>,
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self.change {
            StockChange::SimpleIncreased { .. } => "inventory.stock.simple_increased",
            StockChange::SimpleDecreased { .. } => "inventory.stock.simple_decreased",
            StockChange::SerialUnitsReceived { .. } => "inventory.stock.serial_units_received",
            StockChange::SerialUnitsRestored { .. } => "inventory.stock.serial_units_restored",
            StockChange::SerialUnitsSold { .. } => "inventory.stock.serial_units_sold",
            StockChange::SerialUnitsRemoved { .. } => "inventory.stock.serial_units_removed",
            StockChange::LotIncreased { .. } => "inventory.stock.lot_increased",
            StockChange::LotDecreased { .. } => "inventory.stock.lot_decreased",
            StockChange::ExpirationBatchOpened { .. } => "inventory.stock.expiration_batch_opened",
            StockChange::ExpirationBatchIncreased { .. } => {
                "inventory.stock.expiration_batch_increased"
            }
            StockChange::ExpirationBatchDecreased { .. } => {
                "inventory.stock.expiration_batch_decreased"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl Aggregate for InventoryAggregate {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        let at = event.occurred_at;

        match &event.change {
            StockChange::SimpleIncreased { .. } | StockChange::SimpleDecreased { .. } => {}
            StockChange::SerialUnitsReceived { serials } => {
                for serial in serials {
                    self.serial_units.insert(
                        serial.clone(),
                        SerialUnit {
                            serial_number: serial.clone(),
                            is_sold: false,
                            received_at: at,
                            sold_at: None,
                        },
                    );
                }
            }
            StockChange::SerialUnitsRestored { serials } => {
                for serial in serials {
                    if let Some(unit) = self.serial_units.get_mut(serial) {
                        unit.is_sold = false;
                        unit.sold_at = None;
                    }
                }
            }
            StockChange::SerialUnitsSold { serials } => {
                for serial in serials {
                    if let Some(unit) = self.serial_units.get_mut(serial) {
                        unit.is_sold = true;
                        unit.sold_at = Some(at);
                    }
                }
            }
            StockChange::SerialUnitsRemoved { serials } => {
                for serial in serials {
                    self.serial_units.remove(serial);
                }
            }
            StockChange::LotIncreased { lot_code, quantity } => {
                self.lot_batches
                    .entry(lot_code.clone())
                    .or_insert(LotBatch {
                        quantity: 0,
                        received_at: at,
                    })
                    .quantity += quantity;
            }
            StockChange::LotDecreased { lot_code, quantity } => {
                if let Some(batch) = self.lot_batches.get_mut(lot_code) {
                    batch.quantity -= quantity;
                }
            }
            StockChange::ExpirationBatchOpened {
                batch_id,
                expiration_date,
                quantity,
            } => {
                self.expiration_batches.push(ExpirationBatch {
                    id: *batch_id,
                    expiration_date: *expiration_date,
                    quantity: *quantity,
                    received_at: at,
                });
                self.next_batch_no = self.next_batch_no.max(batch_id.0 + 1);
            }
            StockChange::ExpirationBatchIncreased {
                batch_id, quantity, ..
            } => {
                if let Some(batch) = self.expiration_batches.iter_mut().find(|b| b.id == *batch_id)
                {
                    batch.quantity += quantity;
                }
            }
            StockChange::ExpirationBatchDecreased {
                batch_id, quantity, ..
            } => {
                if let Some(batch) = self.expiration_batches.iter_mut().find(|b| b.id == *batch_id)
                {
                    batch.quantity -= quantity;
                }
            }
        }

        self.quantity += event.change.delta();

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.key() != self.key {
            return Err(DomainError::invariant("stock key mismatch"));
        }

        let quantity = command.quantity();
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let changes = match command {
            StockCommand::Increase(cmd) => {
                let spec = TrackingSpec::resolve(cmd.tracking_type, &cmd.payload)?;
                self.ensure_discipline(spec.tracking_type())?;
                strategy::plan_increase(self, spec, quantity, cmd.kind)?
            }
            StockCommand::Decrease(cmd) => {
                if self.is_new() {
                    return Err(DomainError::insufficient(0, quantity));
                }
                let spec = TrackingSpec::resolve(cmd.tracking_type, &cmd.payload)?;
                self.ensure_discipline(spec.tracking_type())?;
                let today = cmd.occurred_at.date_naive();
                strategy::plan_decrease(self, spec, quantity, cmd.kind, today)?
            }
        };

        let delta: i64 = changes.iter().map(StockChange::delta).sum();
        if self.quantity + delta < 0 {
            return Err(DomainError::NegativeStockInvariantViolated {
                current: self.quantity,
                delta,
            });
        }

        let occurred_at = command.occurred_at();
        Ok(changes
            .into_iter()
            .map(|change| StockEvent {
                key: self.key,
                change,
                occurred_at,
            })
            .collect())
    }
}

impl InventoryAggregate {
    fn ensure_discipline(&self, requested: TrackingType) -> Result<(), DomainError> {
        match self.discipline() {
            Some(held) if held != requested => Err(DomainError::invariant(format!(
                "stock for {} is held as {held}, cannot apply a {requested} movement",
                self.key
            ))),
            _ => Ok(()),
        }
    }
}

/// Outcome of one successful ledger call.
///
/// `applied` is the payload the strategy actually used: the serials moved, the
/// lot code, or the expiration batch (id and date) that was opened, topped up,
/// or drawn from. Replaying it in the inverse direction undoes the movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub key: StockKey,
    pub direction: StockDirection,
    pub kind: MovementKind,
    pub tracking_type: TrackingType,
    pub quantity: i64,
    pub applied: TrackingPayload,
    pub resulting_quantity: i64,
}

impl StockMovement {
    pub fn from_events(command: &StockCommand, events: &[StockEvent], resulting_quantity: i64) -> Self {
        let mut applied = TrackingPayload::none();

        for event in events {
            match &event.change {
                StockChange::SimpleIncreased { .. } | StockChange::SimpleDecreased { .. } => {}
                StockChange::SerialUnitsReceived { serials }
                | StockChange::SerialUnitsRestored { serials }
                | StockChange::SerialUnitsSold { serials }
                | StockChange::SerialUnitsRemoved { serials } => {
                    applied.serial_numbers.extend(serials.iter().cloned());
                }
                StockChange::LotIncreased { lot_code, .. }
                | StockChange::LotDecreased { lot_code, .. } => {
                    applied.lot_code = Some(lot_code.clone());
                }
                StockChange::ExpirationBatchOpened {
                    batch_id,
                    expiration_date,
                    ..
                }
                | StockChange::ExpirationBatchIncreased {
                    batch_id,
                    expiration_date,
                    ..
                }
                | StockChange::ExpirationBatchDecreased {
                    batch_id,
                    expiration_date,
                    ..
                } => {
                    applied.expiration_batch_id = Some(*batch_id);
                    applied.expiration_date = Some(*expiration_date);
                }
            }
        }

        Self {
            key: command.key(),
            direction: command.direction(),
            kind: command.kind(),
            tracking_type: command.tracking_type(),
            quantity: command.quantity(),
            applied,
            resulting_quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stockledger_core::AggregateId;

    fn test_key() -> StockKey {
        StockKey::new(ProductId::new(AggregateId::new()), LocationId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn increase(key: StockKey, qty: i64, tt: TrackingType, payload: TrackingPayload) -> StockCommand {
        StockCommand::Increase(IncreaseStock {
            key,
            quantity: qty,
            tracking_type: tt,
            payload,
            kind: MovementKind::Issue,
            occurred_at: test_time(),
        })
    }

    fn decrease(key: StockKey, qty: i64, tt: TrackingType, payload: TrackingPayload) -> StockCommand {
        StockCommand::Decrease(DecreaseStock {
            key,
            quantity: qty,
            tracking_type: tt,
            payload,
            kind: MovementKind::Issue,
            occurred_at: test_time(),
        })
    }

    fn reversed(command: StockCommand) -> StockCommand {
        match command {
            StockCommand::Increase(cmd) => StockCommand::Increase(IncreaseStock {
                kind: MovementKind::Reversal,
                ..cmd
            }),
            StockCommand::Decrease(cmd) => StockCommand::Decrease(DecreaseStock {
                kind: MovementKind::Reversal,
                ..cmd
            }),
        }
    }

    fn execute(stock: &mut InventoryAggregate, cmd: &StockCommand) -> Result<Vec<StockEvent>, DomainError> {
        let events = stock.handle(cmd)?;
        stock.apply_all(&events);
        Ok(events)
    }

    #[test]
    fn simple_increase_then_decrease() {
        let key = test_key();
        let mut stock = InventoryAggregate::empty(key);

        execute(&mut stock, &increase(key, 20, TrackingType::Simple, TrackingPayload::none()))
            .unwrap();
        execute(&mut stock, &decrease(key, 5, TrackingType::Simple, TrackingPayload::none()))
            .unwrap();

        assert_eq!(stock.quantity(), 15);
        assert_eq!(stock.version(), 2);
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let key = test_key();
        let stock = InventoryAggregate::empty(key);

        let err = stock
            .handle(&increase(key, 0, TrackingType::Simple, TrackingPayload::none()))
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[test]
    fn decrease_without_aggregate_is_insufficient() {
        let key = test_key();
        let stock = InventoryAggregate::empty(key);

        let err = stock
            .handle(&decrease(key, 1, TrackingType::Serialized, TrackingPayload::serials(["A"])))
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient(0, 1));
    }

    #[test]
    fn serialized_sell_marks_units_and_reversal_restores_them() {
        let key = test_key();
        let mut stock = InventoryAggregate::empty(key);

        execute(
            &mut stock,
            &increase(key, 2, TrackingType::Serialized, TrackingPayload::serials(["SN1", "SN2"])),
        )
        .unwrap();
        execute(
            &mut stock,
            &decrease(key, 1, TrackingType::Serialized, TrackingPayload::serials(["SN1"])),
        )
        .unwrap();

        let unit = stock.serial_unit("SN1").unwrap();
        assert!(unit.is_sold);
        assert_eq!(unit.sold_at, Some(test_time()));
        assert_eq!(stock.available_serials(), vec!["SN2".to_string()]);
        assert_eq!(stock.quantity(), 1);

        let err = stock
            .handle(&increase(key, 1, TrackingType::Serialized, TrackingPayload::serials(["SN1"])))
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateSerial("SN1".into()));

        let events = execute(
            &mut stock,
            &reversed(increase(key, 1, TrackingType::Serialized, TrackingPayload::serials(["SN1"]))),
        )
        .unwrap();
        assert!(matches!(events[0].change, StockChange::SerialUnitsRestored { .. }));

        let unit = stock.serial_unit("SN1").unwrap();
        assert!(!unit.is_sold);
        assert_eq!(unit.sold_at, None);
        assert_eq!(stock.quantity(), 2);
    }

    #[test]
    fn lot_decrease_beyond_bucket_leaves_lot_untouched() {
        let key = test_key();
        let mut stock = InventoryAggregate::empty(key);

        execute(&mut stock, &increase(key, 4, TrackingType::LotTracked, TrackingPayload::lot("L1")))
            .unwrap();
        let err = stock
            .handle(&decrease(key, 10, TrackingType::LotTracked, TrackingPayload::lot("L1")))
            .unwrap_err();

        assert_eq!(err, DomainError::insufficient(4, 10));
        assert_eq!(stock.lot_batch("L1").unwrap().quantity, 4);
        assert_eq!(stock.quantity(), 4);
    }

    #[test]
    fn expirable_fifo_consumes_earliest_batch() {
        let key = test_key();
        let mut stock = InventoryAggregate::empty(key);

        for d in [date(2025, 6, 1), date(2025, 1, 1)] {
            execute(
                &mut stock,
                &increase(key, 5, TrackingType::Expirable, TrackingPayload::expiring(d)),
            )
            .unwrap();
        }

        let cmd = decrease(key, 3, TrackingType::Expirable, TrackingPayload::none());
        let events = execute(&mut stock, &cmd).unwrap();
        let movement = StockMovement::from_events(&cmd, &events, stock.quantity());

        assert_eq!(movement.applied.expiration_date, Some(date(2025, 1, 1)));
        assert_eq!(movement.applied.expiration_batch_id, Some(BatchId(2)));

        let remaining: Vec<(NaiveDate, i64)> = stock
            .expiration_batches()
            .iter()
            .map(|b| (b.expiration_date, b.quantity))
            .collect();
        assert!(remaining.contains(&(date(2025, 1, 1), 2)));
        assert!(remaining.contains(&(date(2025, 6, 1), 5)));
        assert_eq!(stock.quantity(), 7);
    }

    #[test]
    fn mixing_disciplines_is_an_invariant_violation() {
        let key = test_key();
        let mut stock = InventoryAggregate::empty(key);

        execute(&mut stock, &increase(key, 3, TrackingType::Simple, TrackingPayload::none()))
            .unwrap();
        let err = stock
            .handle(&increase(key, 1, TrackingType::LotTracked, TrackingPayload::lot("L1")))
            .unwrap_err();
        assert_eq!(err.code(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn handle_does_not_mutate() {
        let key = test_key();
        let stock = InventoryAggregate::empty(key);
        let before = stock.clone();

        let _ = stock.handle(&increase(key, 3, TrackingType::Simple, TrackingPayload::none()));
        assert_eq!(stock, before);
    }

    #[test]
    fn event_types_are_namespaced() {
        let event = StockEvent {
            key: test_key(),
            change: StockChange::LotIncreased {
                lot_code: "L1".into(),
                quantity: 1,
            },
            occurred_at: test_time(),
        };
        assert_eq!(event.event_type(), "inventory.stock.lot_increased");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Increase(i64),
            Decrease(i64),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1i64..20).prop_map(Op::Increase),
                (1i64..20).prop_map(Op::Decrease),
            ]
        }

        fn payload_for(tt: TrackingType, qty: i64, next_serial: &mut u64, held: &[String]) -> TrackingPayload {
            match tt {
                TrackingType::Simple => TrackingPayload::none(),
                TrackingType::LotTracked => TrackingPayload::lot("LOT-A"),
                TrackingType::Expirable => TrackingPayload::expiring(date(2030, 1, 1)),
                TrackingType::Serialized => {
                    if held.is_empty() {
                        let serials = (0..qty).map(|_| {
                            *next_serial += 1;
                            format!("SN-{next_serial}")
                        });
                        TrackingPayload::serials(serials.collect::<Vec<_>>())
                    } else {
                        TrackingPayload::serials(held.iter().take(qty as usize).cloned().collect::<Vec<_>>())
                    }
                }
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: quantity never goes negative and always equals the
            /// units held by the active sub-collection.
            #[test]
            fn quantity_tracks_active_units(
                tt in prop_oneof![
                    Just(TrackingType::Simple),
                    Just(TrackingType::Serialized),
                    Just(TrackingType::LotTracked),
                    Just(TrackingType::Expirable),
                ],
                ops in prop::collection::vec(op(), 1..40)
            ) {
                let key = test_key();
                let mut stock = InventoryAggregate::empty(key);
                let mut next_serial = 0u64;

                for op in ops {
                    let cmd = match op {
                        Op::Increase(qty) => {
                            let payload = payload_for(tt, qty, &mut next_serial, &[]);
                            increase(key, qty, tt, payload)
                        }
                        Op::Decrease(qty) => {
                            let held = stock.available_serials();
                            let payload = payload_for(tt, qty, &mut next_serial, &held);
                            decrease(key, qty, tt, payload)
                        }
                    };

                    // Rejections are fine; they must simply leave state intact.
                    if let Ok(events) = stock.handle(&cmd) {
                        stock.apply_all(&events);
                    }

                    prop_assert!(stock.quantity() >= 0);
                    prop_assert_eq!(stock.quantity(), stock.active_units());
                }
            }
        }
    }
}
