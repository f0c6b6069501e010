//! Product store: creation, lookup and standalone stock changes.

use common::AggregateId;
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::retry::RetryPolicy;

use super::{CreateProduct, Product, ProductEvent};

/// Service for managing products.
///
/// Order operations do not go through the stock methods here; they stage
/// product events next to the order's own through [`handler`](Self::handler)
/// so both streams commit in one transaction.
pub struct ProductStore<S: EventStore> {
    handler: CommandHandler<S, Product>,
    retry: RetryPolicy,
}

impl<S: EventStore + Clone> Clone for ProductStore<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S: EventStore> ProductStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Product> {
        &self.handler
    }

    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn create_product(
        &self,
        cmd: CreateProduct,
    ) -> Result<CommandResult<Product>, DomainError> {
        let result = self
            .handler
            .execute(cmd.aggregate_id(), |product| product.create(&cmd))
            .await?;

        tracing::info!(
            name = result.aggregate.name(),
            amount_in_stock = result.aggregate.amount_in_stock(),
            "product created"
        );
        Ok(result)
    }

    /// Loads a product by ID.
    ///
    /// Returns None if the product doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: AggregateId) -> Result<Option<Product>, DomainError> {
        self.handler.load_existing(product_id).await
    }

    /// Lists all products in creation order.
    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        self.handler.load_all().await
    }

    /// Takes one unit of stock outside of any order.
    #[tracing::instrument(skip(self))]
    pub async fn decrement_stock(
        &self,
        product_id: AggregateId,
    ) -> Result<CommandResult<Product>, DomainError> {
        self.retry
            .run("decrement_stock", move || {
                self.change_stock(product_id, Product::decrement_stock)
            })
            .await
    }

    /// Returns one unit of stock outside of any order.
    #[tracing::instrument(skip(self))]
    pub async fn increment_stock(
        &self,
        product_id: AggregateId,
    ) -> Result<CommandResult<Product>, DomainError> {
        self.retry
            .run("increment_stock", move || {
                self.change_stock(product_id, Product::increment_stock)
            })
            .await
    }

    async fn change_stock(
        &self,
        product_id: AggregateId,
        change: fn(&Product) -> Result<Vec<ProductEvent>, super::ProductError>,
    ) -> Result<CommandResult<Product>, DomainError> {
        let product = self.handler.load_required(product_id).await?;
        let events = change(&product)?;

        let result = self.handler.persist(product_id, product, events).await?;
        self.handler.snapshot_if_due(&result.aggregate).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::money::Money;
    use crate::product::ProductError;
    use event_store::{EventStoreExt, InMemoryEventStore, Version};

    async fn create(store: &ProductStore<InMemoryEventStore>, stock: u32) -> AggregateId {
        let cmd = CreateProduct::new("Widget", 1001, Money::from_cents(250), stock);
        let product_id = cmd.product_id;
        store.create_product(cmd).await.unwrap();
        product_id
    }

    #[tokio::test]
    async fn test_create_and_get_product() {
        let store = ProductStore::new(InMemoryEventStore::new());
        let product_id = create(&store, 5).await;

        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.id(), Some(product_id));
        assert_eq!(product.amount_in_stock(), 5);
        assert_eq!(product.version(), Version::first());
    }

    #[tokio::test]
    async fn test_get_unknown_product_is_none() {
        let store = ProductStore::new(InMemoryEventStore::new());
        assert!(store.get_product(AggregateId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_same_id_twice_fails() {
        let store = ProductStore::new(InMemoryEventStore::new());
        let product_id = create(&store, 1).await;

        let again = CreateProduct::new("Widget", 1001, Money::from_cents(250), 1).with_id(product_id);
        let err = store.create_product(again).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Product(ProductError::AlreadyCreated)
        ));
    }

    #[tokio::test]
    async fn test_list_products_in_creation_order() {
        let store = ProductStore::new(InMemoryEventStore::new());
        let first = create(&store, 1).await;
        let second = create(&store, 2).await;

        let ids: Vec<_> = store
            .list_products()
            .await
            .unwrap()
            .iter()
            .filter_map(|p| p.id())
            .collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_stock_changes() {
        let store = ProductStore::new(InMemoryEventStore::new());
        let product_id = create(&store, 1).await;

        let result = store.decrement_stock(product_id).await.unwrap();
        assert_eq!(result.aggregate.amount_in_stock(), 0);

        let err = store.decrement_stock(product_id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Product(ProductError::OutOfStock { .. })
        ));

        let result = store.increment_stock(product_id).await.unwrap();
        assert_eq!(result.aggregate.amount_in_stock(), 1);
        assert_eq!(result.new_version, Version::new(3));
    }

    #[tokio::test]
    async fn test_stock_change_on_unknown_product() {
        let store = ProductStore::new(InMemoryEventStore::new());

        let err = store.increment_stock(AggregateId::new()).await.unwrap_err();
        assert!(matches!(err, DomainError::AggregateNotFound { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_taken_every_hundred_events() {
        let events = InMemoryEventStore::new();
        let store = ProductStore::new(events.clone());
        let product_id = create(&store, 0).await;

        for _ in 0..99 {
            store.increment_stock(product_id).await.unwrap();
        }

        let (snapshot, tail) = events.load_aggregate(product_id).await.unwrap();
        assert_eq!(snapshot.unwrap().version, Version::new(100));
        assert!(tail.is_empty());

        let product = store.get_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.amount_in_stock(), 99);
        assert_eq!(product.version(), Version::new(100));
    }
}
