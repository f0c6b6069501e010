//! Domain layer for the order workflow.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - CommandHandler for loading aggregates and staging their events
//! - Product aggregate and ProductStore
//! - Order aggregate, its state machine, and the OrderService lifecycle manager
//! - RetryPolicy for re-running operations that lose a concurrency race

pub mod aggregate;
pub mod command;
pub mod error;
pub mod money;
pub mod order;
pub mod product;
pub mod retry;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use money::Money;
pub use order::{
    AddProduct, CreateOrder, Order, OrderError, OrderEvent, OrderLine, OrderService, OrderState,
    OrderTransition, RemoveProduct, ShipOrder, SubmitOrder,
};
pub use product::{CreateProduct, Product, ProductError, ProductEvent, ProductStore};
pub use retry::RetryPolicy;
