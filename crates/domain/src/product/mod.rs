//! Product aggregate and the product store.

mod aggregate;
mod commands;
mod events;
mod store;

pub use aggregate::Product;
pub use commands::CreateProduct;
pub use events::{ProductCreatedData, ProductEvent, StockChangedData};
pub use store::ProductStore;

use thiserror::Error;

/// Errors that can occur during product operations.
#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product name is required")]
    NameRequired,

    #[error("Invalid cost: {cost_in_cents} (must not be negative)")]
    NegativeCost { cost_in_cents: i64 },

    #[error("Product already created")]
    AlreadyCreated,

    /// No units left to take.
    #[error("Product '{name}' is out of stock")]
    OutOfStock { name: String },

    #[error("Stock count for '{name}' would overflow")]
    StockOverflow { name: String },
}
