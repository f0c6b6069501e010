//! Product aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::money::Money;

use super::{CreateProduct, ProductError, ProductEvent, events::ProductCreatedData};

/// Product aggregate root.
///
/// Knows nothing about orders. Stock only moves one unit at a time, through
/// [`decrement_stock`](Self::decrement_stock) and
/// [`increment_stock`](Self::increment_stock).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    name: String,
    serial_number: i64,
    cost: Money,
    amount_in_stock: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProductEvent::ProductCreated(data) => self.apply_product_created(data),
            ProductEvent::StockDecremented(data) | ProductEvent::StockIncremented(data) => {
                self.amount_in_stock = data.amount_in_stock;
                self.updated_at = data.changed_at;
            }
        }
    }
}

impl SnapshotCapable for Product {}

// Query methods
impl Product {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial_number(&self) -> i64 {
        self.serial_number
    }

    pub fn cost(&self) -> Money {
        self.cost
    }

    pub fn cost_in_cents(&self) -> i64 {
        self.cost.cents()
    }

    pub fn amount_in_stock(&self) -> u32 {
        self.amount_in_stock
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Command methods (return events)
impl Product {
    pub fn create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, ProductError> {
        if self.id.is_some() {
            return Err(ProductError::AlreadyCreated);
        }

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(ProductError::NameRequired);
        }

        if cmd.cost.is_negative() {
            return Err(ProductError::NegativeCost {
                cost_in_cents: cmd.cost.cents(),
            });
        }

        Ok(vec![ProductEvent::product_created(
            cmd.product_id,
            name,
            cmd.serial_number,
            cmd.cost,
            cmd.amount_in_stock,
        )])
    }

    /// Takes one unit out of stock.
    pub fn decrement_stock(&self) -> Result<Vec<ProductEvent>, ProductError> {
        match self.amount_in_stock.checked_sub(1) {
            Some(remaining) => Ok(vec![ProductEvent::stock_decremented(remaining)]),
            None => Err(ProductError::OutOfStock {
                name: self.name.clone(),
            }),
        }
    }

    /// Puts one unit back into stock.
    pub fn increment_stock(&self) -> Result<Vec<ProductEvent>, ProductError> {
        match self.amount_in_stock.checked_add(1) {
            Some(amount) => Ok(vec![ProductEvent::stock_incremented(amount)]),
            None => Err(ProductError::StockOverflow {
                name: self.name.clone(),
            }),
        }
    }
}

impl Product {
    fn apply_product_created(&mut self, data: ProductCreatedData) {
        self.id = Some(data.product_id);
        self.name = data.name;
        self.serial_number = data.serial_number;
        self.cost = data.cost;
        self.amount_in_stock = data.amount_in_stock;
        self.created_at = data.created_at;
        self.updated_at = data.created_at;
    }
}
