//! Value objects for the order domain.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// One unit of a product on an order.
///
/// Name and cost are copied from the product when the line is added, so the
/// order total does not change if the product's record does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: AggregateId,
    pub product_name: String,
    pub cost: Money,
}

impl OrderLine {
    pub fn new(product_id: AggregateId, product_name: impl Into<String>, cost: Money) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            cost,
        }
    }
}
