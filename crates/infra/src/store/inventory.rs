use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockledger_core::{AggregateRoot, ExpectedVersion, LocationId};
use stockledger_inventory::{InventoryAggregate, StockKey};

use crate::error::StoreError;

/// Persistence for inventory aggregates.
///
/// Implementations must reject a `save` that would leave one serial number
/// recorded under two aggregates of the same location.
pub trait InventoryStore: Send + Sync {
    /// `None` when nothing was ever stocked for the key.
    fn load(&self, key: StockKey) -> Result<Option<InventoryAggregate>, StoreError>;

    /// Replace the stored aggregate if its version still matches `expected`.
    fn save(
        &self,
        aggregate: &InventoryAggregate,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    /// The aggregate holding a record of `serial` at `location`, sold or not.
    fn serial_holder(
        &self,
        location_id: LocationId,
        serial: &str,
    ) -> Result<Option<StockKey>, StoreError>;
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn load(&self, key: StockKey) -> Result<Option<InventoryAggregate>, StoreError> {
        (**self).load(key)
    }

    fn save(
        &self,
        aggregate: &InventoryAggregate,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).save(aggregate, expected)
    }

    fn serial_holder(
        &self,
        location_id: LocationId,
        serial: &str,
    ) -> Result<Option<StockKey>, StoreError> {
        (**self).serial_holder(location_id, serial)
    }
}

#[derive(Debug, Default)]
struct Tables {
    aggregates: HashMap<StockKey, InventoryAggregate>,
    /// (location, serial) -> owning aggregate.
    serials: HashMap<(LocationId, String), StockKey>,
}

/// In-memory inventory store with a location-scoped serial index.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored aggregates.
    pub fn len(&self) -> usize {
        self.tables.read().map(|t| t.aggregates.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InventoryStore for InMemoryInventoryStore {
    fn load(&self, key: StockKey) -> Result<Option<InventoryAggregate>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.aggregates.get(&key).cloned())
    }

    fn save(
        &self,
        aggregate: &InventoryAggregate,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let key = aggregate.key();
        let location_id = key.location_id;

        let mut tables = self.tables.write().map_err(|_| poisoned())?;

        let current = tables.aggregates.get(&key).map_or(0, |a| a.version());
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "{key}: expected {expected:?}, found {current}"
            )));
        }

        for serial in aggregate.serial_numbers() {
            if let Some(holder) = tables.serials.get(&(location_id, serial.to_string())) {
                if *holder != key {
                    return Err(StoreError::DuplicateSerial(serial.to_string()));
                }
            }
        }

        // Drop index entries for records the new state no longer holds.
        if let Some(previous) = tables.aggregates.get(&key) {
            let released: Vec<String> = previous
                .serial_numbers()
                .filter(|s| aggregate.serial_unit(s).is_none())
                .map(str::to_string)
                .collect();
            for serial in released {
                tables.serials.remove(&(location_id, serial));
            }
        }

        for serial in aggregate.serial_numbers() {
            tables.serials.insert((location_id, serial.to_string()), key);
        }
        tables.aggregates.insert(key, aggregate.clone());

        Ok(())
    }

    fn serial_holder(
        &self,
        location_id: LocationId,
        serial: &str,
    ) -> Result<Option<StockKey>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.serials.get(&(location_id, serial.to_string())).copied())
    }
}
