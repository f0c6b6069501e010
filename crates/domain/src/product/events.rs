//! Product domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

/// Events that can occur on a product aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    ProductCreated(ProductCreatedData),

    /// One unit was taken for an order line.
    StockDecremented(StockChangedData),

    /// One unit was returned by removing an order line.
    StockIncremented(StockChangedData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "ProductCreated",
            ProductEvent::StockDecremented(_) => "StockDecremented",
            ProductEvent::StockIncremented(_) => "StockIncremented",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreatedData {
    pub product_id: AggregateId,
    pub name: String,
    pub serial_number: i64,
    pub cost: Money,
    pub amount_in_stock: u32,
    pub created_at: DateTime<Utc>,
}

/// Data for both stock events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockChangedData {
    /// Stock count after the change.
    pub amount_in_stock: u32,

    pub changed_at: DateTime<Utc>,
}

impl ProductEvent {
    pub fn product_created(
        product_id: AggregateId,
        name: impl Into<String>,
        serial_number: i64,
        cost: Money,
        amount_in_stock: u32,
    ) -> Self {
        ProductEvent::ProductCreated(ProductCreatedData {
            product_id,
            name: name.into(),
            serial_number,
            cost,
            amount_in_stock,
            created_at: Utc::now(),
        })
    }

    pub fn stock_decremented(amount_in_stock: u32) -> Self {
        ProductEvent::StockDecremented(StockChangedData {
            amount_in_stock,
            changed_at: Utc::now(),
        })
    }

    pub fn stock_incremented(amount_in_stock: u32) -> Self {
        ProductEvent::StockIncremented(StockChangedData {
            amount_in_stock,
            changed_at: Utc::now(),
        })
    }
}
