//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;

use domain::OrderService;
use event_store::EventStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub order_service: OrderService<S>,
    pub event_store: S,
}

impl<S: EventStore + Clone> AppState<S> {
    pub fn new(order_service: OrderService<S>) -> Self {
        let event_store = order_service.store().clone();
        Self {
            order_service,
            event_store,
        }
    }
}
