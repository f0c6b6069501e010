//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::money::Money;

use super::OrderLine;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created.
    OrderCreated(OrderCreatedData),

    /// One unit of a product was added as a new line.
    ProductAdded(ProductAddedData),

    /// The most recently added line for a product was removed.
    ProductRemoved(ProductRemovedData),

    /// Order was submitted for processing.
    OrderSubmitted(OrderSubmittedData),

    /// Order was shipped.
    OrderShipped(OrderShippedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "OrderCreated",
            OrderEvent::ProductAdded(_) => "ProductAdded",
            OrderEvent::ProductRemoved(_) => "ProductRemoved",
            OrderEvent::OrderSubmitted(_) => "OrderSubmitted",
            OrderEvent::OrderShipped(_) => "OrderShipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAddedData {
    pub product_id: AggregateId,

    /// Product name at the time of adding.
    pub product_name: String,

    /// Product cost at the time of adding.
    pub cost: Money,

    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRemovedData {
    pub product_id: AggregateId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSubmittedData {
    pub submitted_at: DateTime<Utc>,

    /// Total cost at submission time.
    pub total_cost: Money,

    pub line_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub shipped_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn order_created(order_id: AggregateId) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            created_at: Utc::now(),
        })
    }

    pub fn product_added(line: &OrderLine) -> Self {
        OrderEvent::ProductAdded(ProductAddedData {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            cost: line.cost,
            added_at: Utc::now(),
        })
    }

    pub fn product_removed(product_id: AggregateId) -> Self {
        OrderEvent::ProductRemoved(ProductRemovedData {
            product_id,
            removed_at: Utc::now(),
        })
    }

    pub fn order_submitted(total_cost: Money, line_count: usize) -> Self {
        OrderEvent::OrderSubmitted(OrderSubmittedData {
            submitted_at: Utc::now(),
            total_cost,
            line_count,
        })
    }

    pub fn order_shipped() -> Self {
        OrderEvent::OrderShipped(OrderShippedData {
            shipped_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let product_id = AggregateId::new();
        let line = OrderLine::new(product_id, "Widget", Money::from_cents(250));

        assert_eq!(
            OrderEvent::order_created(AggregateId::new()).event_type(),
            "OrderCreated"
        );
        assert_eq!(OrderEvent::product_added(&line).event_type(), "ProductAdded");
        assert_eq!(
            OrderEvent::product_removed(product_id).event_type(),
            "ProductRemoved"
        );
        assert_eq!(
            OrderEvent::order_submitted(Money::from_cents(250), 1).event_type(),
            "OrderSubmitted"
        );
        assert_eq!(OrderEvent::order_shipped().event_type(), "OrderShipped");
    }

    #[test]
    fn test_product_added_serialization() {
        let product_id = AggregateId::new();
        let line = OrderLine::new(product_id, "Widget", Money::from_cents(1500));
        let event = OrderEvent::product_added(&line);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ProductAdded"));

        let deserialized: OrderEvent = serde_json::from_str(&json).unwrap();
        if let OrderEvent::ProductAdded(data) = deserialized {
            assert_eq!(data.product_id, product_id);
            assert_eq!(data.product_name, "Widget");
            assert_eq!(data.cost.cents(), 1500);
        } else {
            panic!("Expected ProductAdded event");
        }
    }

    #[test]
    fn test_order_submitted_serialization() {
        let event = OrderEvent::order_submitted(Money::from_cents(700), 3);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderSubmitted");
        assert_eq!(json["data"]["total_cost"], 700);
        assert_eq!(json["data"]["line_count"], 3);
    }
}
