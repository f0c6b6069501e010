//! Order commands.

use common::AggregateId;

use crate::command::Command;

use super::Order;

/// Command to create a new order.
#[derive(Debug, Clone, Copy)]
pub struct CreateOrder {
    pub order_id: AggregateId,
}

impl CreateOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }

    /// Creates a new CreateOrder command with a generated order ID.
    pub fn generate() -> Self {
        Self::new(AggregateId::new())
    }
}

impl Command for CreateOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to add one unit of a product to an order.
#[derive(Debug, Clone, Copy)]
pub struct AddProduct {
    pub order_id: AggregateId,
    pub product_id: AggregateId,
}

impl AddProduct {
    pub fn new(order_id: AggregateId, product_id: AggregateId) -> Self {
        Self {
            order_id,
            product_id,
        }
    }
}

impl Command for AddProduct {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to remove one unit of a product from an order.
#[derive(Debug, Clone, Copy)]
pub struct RemoveProduct {
    pub order_id: AggregateId,
    pub product_id: AggregateId,
}

impl RemoveProduct {
    pub fn new(order_id: AggregateId, product_id: AggregateId) -> Self {
        Self {
            order_id,
            product_id,
        }
    }
}

impl Command for RemoveProduct {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to submit an order for processing.
#[derive(Debug, Clone, Copy)]
pub struct SubmitOrder {
    pub order_id: AggregateId,
}

impl SubmitOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for SubmitOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Command to mark an order as shipped.
#[derive(Debug, Clone, Copy)]
pub struct ShipOrder {
    pub order_id: AggregateId,
}

impl ShipOrder {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for ShipOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
