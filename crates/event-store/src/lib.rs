//! Event persistence for the order workflow.
//!
//! Orders and products are stored as event streams. A [`Transaction`] groups
//! appends to several streams so that an order line and the matching stock
//! change are written together or not at all.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt, StreamAppend, Transaction};
