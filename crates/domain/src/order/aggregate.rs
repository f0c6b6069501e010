//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::money::Money;
use crate::product::Product;

use super::{
    OrderError, OrderEvent, OrderLine, OrderState, OrderTransition,
    events::{OrderCreatedData, ProductAddedData},
};

/// Order aggregate root.
///
/// Lines form a multiset: adding the same product twice yields two lines,
/// and each counts toward the total.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    state: OrderState,

    /// Lines in the order they were added.
    lines: Vec<OrderLine>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderCreated(data) => self.apply_order_created(data),
            OrderEvent::ProductAdded(data) => self.apply_product_added(data),
            OrderEvent::ProductRemoved(data) => {
                self.apply_product_removed(data.product_id);
                self.updated_at = data.removed_at;
            }
            OrderEvent::OrderSubmitted(data) => {
                self.state = OrderState::Processing;
                self.updated_at = data.submitted_at;
            }
            OrderEvent::OrderShipped(data) => {
                self.state = OrderState::Shipped;
                self.updated_at = data.shipped_at;
            }
        }
    }
}

impl SnapshotCapable for Order {}

// Query methods
impl Order {
    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Returns the lines in the order they were added.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Number of lines for `product_id`.
    pub fn quantity_of(&self, product_id: AggregateId) -> usize {
        self.lines
            .iter()
            .filter(|line| line.product_id == product_id)
            .count()
    }

    fn contains_product(&self, product_id: AggregateId) -> bool {
        self.lines.iter().any(|line| line.product_id == product_id)
    }

    /// Sum of every line's cost, duplicates included.
    ///
    /// `add_product` rejects a line that would overflow the total, so the
    /// saturating fold never saturates for orders built from their events.
    pub fn total_cost(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(), |total, line| total.saturating_add(line.cost))
    }

    pub fn total_cost_in_cents(&self) -> i64 {
        self.total_cost().cents()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Command methods (return events)
impl Order {
    pub fn create(&self, order_id: AggregateId) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }

        Ok(vec![OrderEvent::order_created(order_id)])
    }

    /// Adds one unit of `product` as a new line.
    ///
    /// Stock is not checked here; the caller pairs this with the product's
    /// own stock decrement.
    pub fn add_product(
        &self,
        product_id: AggregateId,
        product: &Product,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_modify_lines() {
            return Err(OrderError::InvalidProductAddition { state: self.state });
        }

        if self.total_cost().checked_add(product.cost()).is_none() {
            return Err(OrderError::TotalOverflow {
                product_name: product.name().to_string(),
            });
        }

        let line = OrderLine::new(product_id, product.name(), product.cost());
        Ok(vec![OrderEvent::product_added(&line)])
    }

    /// Removes the most recently added line for `product_id`.
    pub fn remove_product(&self, product_id: AggregateId) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.state.can_modify_lines() {
            return Err(OrderError::InvalidProductRemoval { state: self.state });
        }

        if !self.contains_product(product_id) {
            return Err(OrderError::ProductNotInOrder { product_id });
        }

        Ok(vec![OrderEvent::product_removed(product_id)])
    }

    /// Submits the order.
    ///
    /// An empty unsubmitted order accepts the request but stays unsubmitted,
    /// so no event is produced.
    pub fn submit(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.state.transition(OrderTransition::Submit)?;

        if !self.has_lines() {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::order_submitted(
            self.total_cost(),
            self.lines.len(),
        )])
    }

    pub fn ship(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.state.transition(OrderTransition::Ship)?;
        Ok(vec![OrderEvent::order_shipped()])
    }
}

// Apply event helpers
impl Order {
    fn apply_order_created(&mut self, data: OrderCreatedData) {
        self.id = Some(data.order_id);
        self.state = OrderState::Unsubmitted;
        self.created_at = data.created_at;
        self.updated_at = data.created_at;
    }

    fn apply_product_added(&mut self, data: ProductAddedData) {
        self.lines.push(OrderLine::new(
            data.product_id,
            data.product_name,
            data.cost,
        ));
        self.updated_at = data.added_at;
    }

    fn apply_product_removed(&mut self, product_id: AggregateId) {
        if let Some(position) = self
            .lines
            .iter()
            .rposition(|line| line.product_id == product_id)
        {
            self.lines.remove(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::CreateProduct;

    fn create_order() -> (Order, AggregateId) {
        let mut order = Order::default();
        let order_id = AggregateId::new();
        let events = order.create(order_id).unwrap();
        order.apply_events(events);
        (order, order_id)
    }

    fn product(name: &str, cents: i64) -> Product {
        let mut product = Product::default();
        let cmd = CreateProduct::new(name, 1, Money::from_cents(cents), 10);
        let events = product.create(&cmd).unwrap();
        product.apply_events(events);
        product
    }

    fn add(order: &mut Order, product: &Product) {
        let events = order.add_product(product_id(product), product).unwrap();
        order.apply_events(events);
    }

    fn product_id(product: &Product) -> AggregateId {
        product.id().unwrap()
    }

    #[test]
    fn test_create_order() {
        let (order, order_id) = create_order();
        assert_eq!(order.id(), Some(order_id));
        assert_eq!(order.state(), OrderState::Unsubmitted);
        assert!(order.lines().is_empty());
        assert_eq!(order.total_cost_in_cents(), 0);
    }

    #[test]
    fn test_create_order_twice_fails() {
        let (order, _) = create_order();
        let result = order.create(AggregateId::new());
        assert!(matches!(result, Err(OrderError::AlreadyCreated)));
    }

    #[test]
    fn test_add_product_appends_one_line() {
        let (mut order, _) = create_order();
        let widget = product("Widget", 250);

        add(&mut order, &widget);

        assert_eq!(order.line_count(), 1);
        let line = &order.lines()[0];
        assert_eq!(line.product_id, product_id(&widget));
        assert_eq!(line.product_name, "Widget");
        assert_eq!(line.cost.cents(), 250);
    }

    #[test]
    fn test_total_counts_duplicates() {
        let (mut order, _) = create_order();
        let widget = product("Widget", 250);
        let gadget = product("Gadget", 100);

        add(&mut order, &widget);
        add(&mut order, &widget);
        add(&mut order, &gadget);

        assert_eq!(order.quantity_of(product_id(&widget)), 2);
        assert_eq!(order.total_cost_in_cents(), 600);
    }

    #[test]
    fn test_add_product_rejects_total_overflow() {
        let (mut order, _) = create_order();
        let costly = product("Costly", i64::MAX);
        add(&mut order, &costly);

        let result = order.add_product(product_id(&costly), &costly);

        assert!(matches!(
            result,
            Err(OrderError::TotalOverflow { ref product_name }) if product_name == "Costly"
        ));
        assert_eq!(order.line_count(), 1);
        assert_eq!(order.total_cost_in_cents(), i64::MAX);
    }

    #[test]
    fn test_remove_product_drops_latest_matching_line() {
        let (mut order, _) = create_order();
        let widget = product("Widget", 250);
        let gadget = product("Gadget", 100);
        add(&mut order, &widget);
        add(&mut order, &gadget);
        add(&mut order, &widget);

        let events = order.remove_product(product_id(&widget)).unwrap();
        order.apply_events(events);

        let names: Vec<_> = order
            .lines()
            .iter()
            .map(|l| l.product_name.as_str())
            .collect();
        assert_eq!(names, vec!["Widget", "Gadget"]);
        assert_eq!(order.total_cost_in_cents(), 350);
    }

    #[test]
    fn test_remove_absent_product_fails() {
        let (order, _) = create_order();
        let missing = AggregateId::new();

        let result = order.remove_product(missing);
        assert!(matches!(
            result,
            Err(OrderError::ProductNotInOrder { product_id }) if product_id == missing
        ));
    }

    #[test]
    fn test_submit_with_lines_moves_to_processing() {
        let (mut order, _) = create_order();
        add(&mut order, &product("Widget", 250));

        let events = order.submit().unwrap();
        assert_eq!(events.len(), 1);
        order.apply_events(events);

        assert_eq!(order.state(), OrderState::Processing);
    }

    #[test]
    fn test_submit_empty_order_is_noop() {
        let (order, _) = create_order();

        let events = order.submit().unwrap();

        assert!(events.is_empty());
        assert_eq!(order.state(), OrderState::Unsubmitted);
    }

    #[test]
    fn test_submitted_order_rejects_line_changes() {
        let (mut order, _) = create_order();
        let widget = product("Widget", 250);
        add(&mut order, &widget);
        order.apply_events(order.submit().unwrap());

        assert!(matches!(
            order.add_product(product_id(&widget), &widget),
            Err(OrderError::InvalidProductAddition {
                state: OrderState::Processing
            })
        ));
        assert!(matches!(
            order.remove_product(product_id(&widget)),
            Err(OrderError::InvalidProductRemoval {
                state: OrderState::Processing
            })
        ));
        assert_eq!(order.line_count(), 1);
    }

    #[test]
    fn test_ship_requires_processing() {
        let (mut order, _) = create_order();
        assert!(matches!(
            order.ship(),
            Err(OrderError::InvalidStateTransition {
                current_state: OrderState::Unsubmitted,
                action: "ship"
            })
        ));

        add(&mut order, &product("Widget", 250));
        order.apply_events(order.submit().unwrap());
        order.apply_events(order.ship().unwrap());
        assert_eq!(order.state(), OrderState::Shipped);

        assert!(order.ship().is_err());
        assert!(matches!(
            order.submit(),
            Err(OrderError::InvalidStateTransition {
                current_state: OrderState::Shipped,
                action: "submit"
            })
        ));
    }

    #[test]
    fn test_replay_rebuilds_same_state() {
        let (mut order, order_id) = create_order();
        let widget = product("Widget", 250);
        let mut history = vec![OrderEvent::order_created(order_id)];

        let widget_id = product_id(&widget);
        for events in [
            order.add_product(widget_id, &widget).unwrap(),
            order.add_product(widget_id, &widget).unwrap(),
        ] {
            history.extend(events.iter().cloned());
            order.apply_events(events);
        }
        let removed = order.remove_product(widget_id).unwrap();
        history.extend(removed.iter().cloned());
        order.apply_events(removed);

        let mut replayed = Order::default();
        replayed.apply_events(history);

        assert_eq!(replayed.lines(), order.lines());
        assert_eq!(replayed.state(), order.state());
    }
}
