//! Order lifecycle service.
//!
//! Adding or removing a product changes two streams: the order gains or
//! loses a line and the product loses or regains a unit of stock. Both sets
//! of events are staged into one [`Transaction`] with the versions the
//! aggregates were loaded at, so either both commit or neither does. A
//! concurrent writer on either stream turns into a conflict, and the whole
//! operation is re-run against fresh state.

use common::AggregateId;
use event_store::{EventStore, Transaction};

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::product::{Product, ProductError, ProductEvent, ProductStore};
use crate::retry::RetryPolicy;

use super::{
    AddProduct, CreateOrder, Order, OrderError, OrderEvent, RemoveProduct, ShipOrder, SubmitOrder,
};

/// Service for managing orders and their effect on product stock.
pub struct OrderService<S: EventStore> {
    orders: CommandHandler<S, Order>,
    products: ProductStore<S>,
    retry: RetryPolicy,
}

impl<S: EventStore + Clone> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            orders: CommandHandler::new(store.clone()),
            products: ProductStore::new(store),
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the conflict retry policy for order and product operations.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.products = self.products.with_retry_policy(retry.clone());
        self.retry = retry;
        self
    }

    /// Returns the product store sharing this service's event store.
    pub fn products(&self) -> &ProductStore<S> {
        &self.products
    }

    pub fn store(&self) -> &S {
        self.orders.store()
    }

    /// Creates a new, empty, unsubmitted order.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<CommandResult<Order>, DomainError> {
        let order_id = cmd.aggregate_id();

        let result = self
            .orders
            .execute(order_id, |order| order.create(order_id))
            .await?;

        tracing::info!(%order_id, "order created");
        Ok(result)
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.orders.load_existing(order_id).await
    }

    /// Lists all orders in creation order.
    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        self.orders.load_all().await
    }

    /// Adds one unit of a product to an unsubmitted order, taking it from
    /// the product's stock.
    #[tracing::instrument(skip(self))]
    pub async fn add_product(&self, cmd: AddProduct) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .retry
            .run("add_product", move || self.try_add_product(cmd))
            .await;

        match &result {
            Ok(_) => metrics::counter!("order_products_added_total").increment(1),
            Err(DomainError::Product(ProductError::OutOfStock { .. })) => {
                metrics::counter!("order_out_of_stock_total").increment(1);
                tracing::info!(
                    order_id = %cmd.order_id,
                    product_id = %cmd.product_id,
                    "product out of stock"
                );
            }
            Err(_) => {}
        }
        result
    }

    /// Removes the most recently added unit of a product from an unsubmitted
    /// order and returns it to stock.
    #[tracing::instrument(skip(self))]
    pub async fn remove_product(
        &self,
        cmd: RemoveProduct,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .retry
            .run("remove_product", move || self.try_remove_product(cmd))
            .await?;

        metrics::counter!("order_products_removed_total").increment(1);
        Ok(result)
    }

    /// Submits an order. An empty order stays unsubmitted and nothing is
    /// written.
    #[tracing::instrument(skip(self))]
    pub async fn submit_order(&self, cmd: SubmitOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .retry
            .run("submit_order", move || {
                self.transition(cmd.aggregate_id(), Order::submit)
            })
            .await?;

        if result.events.is_empty() {
            tracing::debug!(order_id = %cmd.order_id, "empty order left unsubmitted");
        } else {
            metrics::counter!("orders_submitted_total").increment(1);
            tracing::info!(
                order_id = %cmd.order_id,
                total_cost = %result.aggregate.total_cost(),
                "order submitted"
            );
        }
        Ok(result)
    }

    /// Marks a processing order as shipped.
    #[tracing::instrument(skip(self))]
    pub async fn ship_order(&self, cmd: ShipOrder) -> Result<CommandResult<Order>, DomainError> {
        let result = self
            .retry
            .run("ship_order", move || {
                self.transition(cmd.aggregate_id(), Order::ship)
            })
            .await?;

        metrics::counter!("orders_shipped_total").increment(1);
        tracing::info!(order_id = %cmd.order_id, "order shipped");
        Ok(result)
    }

    async fn try_add_product(&self, cmd: AddProduct) -> Result<CommandResult<Order>, DomainError> {
        let order = self.orders.load_required(cmd.order_id).await?;
        let product = self.products.handler().load_required(cmd.product_id).await?;

        let order_events = order.add_product(cmd.product_id, &product)?;
        let product_events = product.decrement_stock()?;

        let mut transaction = Transaction::new();
        self.orders
            .stage(&mut transaction, cmd.order_id, &order, &order_events)?;
        self.products
            .handler()
            .stage(&mut transaction, cmd.product_id, &product, &product_events)?;
        self.store().commit(transaction).await?;

        Ok(self
            .finish_line_change(order, order_events, product, product_events)
            .await)
    }

    async fn try_remove_product(
        &self,
        cmd: RemoveProduct,
    ) -> Result<CommandResult<Order>, DomainError> {
        let order = self.orders.load_required(cmd.order_id).await?;
        let order_events = order.remove_product(cmd.product_id)?;

        let product = self.products.handler().load_required(cmd.product_id).await?;
        let product_events = product.increment_stock()?;

        let mut transaction = Transaction::new();
        self.orders
            .stage(&mut transaction, cmd.order_id, &order, &order_events)?;
        self.products
            .handler()
            .stage(&mut transaction, cmd.product_id, &product, &product_events)?;
        self.store().commit(transaction).await?;

        Ok(self
            .finish_line_change(order, order_events, product, product_events)
            .await)
    }

    /// Applies committed line-change events and snapshots either side if due.
    async fn finish_line_change(
        &self,
        order: Order,
        order_events: Vec<OrderEvent>,
        product: Product,
        product_events: Vec<ProductEvent>,
    ) -> CommandResult<Order> {
        let product = CommandResult::from_committed(product, product_events);
        let order = CommandResult::from_committed(order, order_events);

        tracing::debug!(
            order_version = %order.new_version,
            product_version = %product.new_version,
            amount_in_stock = product.aggregate.amount_in_stock(),
            "line change committed"
        );

        self.products
            .handler()
            .snapshot_if_due(&product.aggregate)
            .await;
        self.orders.snapshot_if_due(&order.aggregate).await;
        order
    }

    async fn transition(
        &self,
        order_id: AggregateId,
        decide: fn(&Order) -> Result<Vec<OrderEvent>, OrderError>,
    ) -> Result<CommandResult<Order>, DomainError> {
        let order = self.orders.load_required(order_id).await?;
        let events = decide(&order)?;

        let result = self.orders.persist(order_id, order, events).await?;
        self.orders.snapshot_if_due(&result.aggregate).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::money::Money;
    use crate::order::OrderState;
    use crate::product::CreateProduct;
    use event_store::{InMemoryEventStore, Version};

    async fn setup(stock: u32) -> (OrderService<InMemoryEventStore>, AggregateId, AggregateId) {
        let service = OrderService::new(InMemoryEventStore::new());

        let cmd = CreateOrder::generate();
        let order_id = cmd.order_id;
        service.create_order(cmd).await.unwrap();

        let cmd = CreateProduct::new("Widget", 1001, Money::from_cents(250), stock);
        let product_id = cmd.product_id;
        service.products().create_product(cmd).await.unwrap();

        (service, order_id, product_id)
    }

    async fn stock_of(service: &OrderService<InMemoryEventStore>, product_id: AggregateId) -> u32 {
        service
            .products()
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .amount_in_stock()
    }

    #[tokio::test]
    async fn test_create_order() {
        let service = OrderService::new(InMemoryEventStore::new());
        let cmd = CreateOrder::generate();
        let order_id = cmd.order_id;

        let result = service.create_order(cmd).await.unwrap();

        assert_eq!(result.aggregate.id(), Some(order_id));
        assert_eq!(result.aggregate.state(), OrderState::Unsubmitted);
        assert_eq!(result.new_version, Version::first());
    }

    #[tokio::test]
    async fn test_add_product_commits_both_streams() {
        let (service, order_id, product_id) = setup(2).await;

        let result = service
            .add_product(AddProduct::new(order_id, product_id))
            .await
            .unwrap();

        assert_eq!(result.aggregate.line_count(), 1);
        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(stock_of(&service, product_id).await, 1);
    }

    #[tokio::test]
    async fn test_out_of_stock_leaves_both_unchanged() {
        let (service, order_id, product_id) = setup(0).await;

        let err = service
            .add_product(AddProduct::new(order_id, product_id))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Product(ProductError::OutOfStock { .. })
        ));
        let order = service.get_order(order_id).await.unwrap().unwrap();
        assert!(order.lines().is_empty());
        assert_eq!(order.version(), Version::first());
        assert_eq!(stock_of(&service, product_id).await, 0);
    }

    #[tokio::test]
    async fn test_remove_product_returns_stock() {
        let (service, order_id, product_id) = setup(1).await;
        service
            .add_product(AddProduct::new(order_id, product_id))
            .await
            .unwrap();

        let result = service
            .remove_product(RemoveProduct::new(order_id, product_id))
            .await
            .unwrap();

        assert!(result.aggregate.lines().is_empty());
        assert_eq!(stock_of(&service, product_id).await, 1);
    }

    #[tokio::test]
    async fn test_remove_absent_product() {
        let (service, order_id, product_id) = setup(1).await;

        let err = service
            .remove_product(RemoveProduct::new(order_id, product_id))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::ProductNotInOrder { .. })
        ));
        assert_eq!(stock_of(&service, product_id).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let (service, _, product_id) = setup(1).await;

        let err = service
            .add_product(AddProduct::new(AggregateId::new(), product_id))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::AggregateNotFound {
                aggregate_type: "Order",
                ..
            }
        ));
        assert_eq!(stock_of(&service, product_id).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (service, order_id, _) = setup(1).await;

        let err = service
            .add_product(AddProduct::new(order_id, AggregateId::new()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::AggregateNotFound {
                aggregate_type: "Product",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_submit_then_ship() {
        let (service, order_id, product_id) = setup(1).await;
        service
            .add_product(AddProduct::new(order_id, product_id))
            .await
            .unwrap();

        let result = service
            .submit_order(SubmitOrder::new(order_id))
            .await
            .unwrap();
        assert_eq!(result.aggregate.state(), OrderState::Processing);

        let result = service.ship_order(ShipOrder::new(order_id)).await.unwrap();
        assert_eq!(result.aggregate.state(), OrderState::Shipped);
        assert_eq!(result.new_version, Version::new(4));
    }

    #[tokio::test]
    async fn test_submit_empty_order_writes_nothing() {
        let (service, order_id, _) = setup(1).await;
        let before = service.store().event_count().await;

        let result = service
            .submit_order(SubmitOrder::new(order_id))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.aggregate.state(), OrderState::Unsubmitted);
        assert_eq!(service.store().event_count().await, before);
    }

    #[tokio::test]
    async fn test_ship_unsubmitted_order_fails() {
        let (service, order_id, _) = setup(1).await;

        let err = service
            .ship_order(ShipOrder::new(order_id))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidStateTransition {
                current_state: OrderState::Unsubmitted,
                action: "ship",
            })
        ));
    }
}
