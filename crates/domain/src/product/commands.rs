//! Product commands.

use common::AggregateId;

use crate::command::Command;
use crate::money::Money;

use super::Product;

/// Command to create a new product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub product_id: AggregateId,
    pub name: String,
    pub serial_number: i64,
    pub cost: Money,
    pub amount_in_stock: u32,
}

impl CreateProduct {
    /// Creates the command with a generated product ID.
    pub fn new(
        name: impl Into<String>,
        serial_number: i64,
        cost: Money,
        amount_in_stock: u32,
    ) -> Self {
        Self {
            product_id: AggregateId::new(),
            name: name.into(),
            serial_number,
            cost,
            amount_in_stock,
        }
    }

    pub fn with_id(mut self, product_id: AggregateId) -> Self {
        self.product_id = product_id;
        self
    }
}

impl Command for CreateProduct {
    type Aggregate = Product;

    fn aggregate_id(&self) -> AggregateId {
        self.product_id
    }
}
