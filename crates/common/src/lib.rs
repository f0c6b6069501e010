//! Types shared by every crate in the order workflow.

mod types;

pub use types::{AggregateId, ParseAggregateIdError};
