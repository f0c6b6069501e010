//! HTTP API server for the order workflow.
//!
//! Exposes product and order endpoints over [`domain::OrderService`], with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use domain::{OrderService, RetryPolicy};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/products",
            post(routes::products::create::<S>).get(routes::products::list::<S>),
        )
        .route("/products/{id}", get(routes::products::get::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        .route(
            "/orders/{id}/products",
            post(routes::orders::add_product::<S>),
        )
        .route(
            "/orders/{id}/products/{product_id}",
            delete(routes::orders::remove_product::<S>),
        )
        .route("/orders/{id}/submit", post(routes::orders::submit::<S>))
        .route("/orders/{id}/ship", post(routes::orders::ship::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the application state over `event_store`, retrying conflicting
/// commits as configured.
pub fn create_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let retry = RetryPolicy::with_max_attempts(config.max_conflict_retries);
    let order_service = OrderService::new(event_store).with_retry_policy(retry);
    Arc::new(AppState::new(order_service))
}
