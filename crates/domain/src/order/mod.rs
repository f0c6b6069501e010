//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::*;
pub use events::{
    OrderCreatedData, OrderEvent, OrderShippedData, OrderSubmittedData, ProductAddedData,
    ProductRemovedData,
};
pub use service::OrderService;
pub use state::{OrderState, OrderTransition};
pub use value_objects::OrderLine;

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Products can only be added while the order is unsubmitted.
    #[error("Cannot add products to a {state} order")]
    InvalidProductAddition { state: OrderState },

    /// Products can only be removed while the order is unsubmitted.
    #[error("Cannot remove products from a {state} order")]
    InvalidProductRemoval { state: OrderState },

    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    #[error("Product {product_id} is not in the order")]
    ProductNotInOrder { product_id: AggregateId },

    /// The order total would no longer fit in `i64` cents.
    #[error("Adding '{product_name}' would overflow the order total")]
    TotalOverflow { product_name: String },

    /// Order is already created.
    #[error("Order already created")]
    AlreadyCreated,
}
