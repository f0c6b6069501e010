//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{
    AddProduct, Aggregate, CreateOrder, Order, RemoveProduct, ShipOrder, SubmitOrder,
};
use event_store::{EventEnvelope, EventStore};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddProductRequest {
    pub product_id: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub state: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_cost_in_cents: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub cost_in_cents: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            state: order.state().to_string(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineResponse {
                    product_id: line.product_id.to_string(),
                    product_name: line.product_name.clone(),
                    cost_in_cents: line.cost.cents(),
                })
                .collect(),
            total_cost_in_cents: order.total_cost_in_cents(),
            version: order.version().as_i64(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

/// Response type for event envelope data.
#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_id: String,
    pub version: i64,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl From<EventEnvelope> for EventEnvelopeResponse {
    fn from(e: EventEnvelope) -> Self {
        Self {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            aggregate_id: e.aggregate_id.to_string(),
            version: e.version.as_i64(),
            timestamp: e.timestamp,
            payload: e.payload,
        }
    }
}

// -- Handlers --

/// POST /orders — open a new, empty order.
#[tracing::instrument(skip(state))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let result = state
        .order_service
        .create_order(CreateOrder::generate())
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&result.aggregate))))
}

/// GET /orders — every order in creation order.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.order_service.list_orders().await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: AggregateId = id.parse()?;
    let order = state
        .order_service
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/products — add one unit of a product.
#[tracing::instrument(skip(state, req))]
pub async fn add_product<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AddProductRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: AggregateId = id.parse()?;
    let product_id: AggregateId = req.product_id.parse()?;

    let result = state
        .order_service
        .add_product(AddProduct::new(order_id, product_id))
        .await?;

    Ok(Json(OrderResponse::from(&result.aggregate)))
}

/// DELETE /orders/{id}/products/{product_id} — remove one unit of a product.
#[tracing::instrument(skip(state))]
pub async fn remove_product<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, product_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: AggregateId = id.parse()?;
    let product_id: AggregateId = product_id.parse()?;

    let result = state
        .order_service
        .remove_product(RemoveProduct::new(order_id, product_id))
        .await?;

    Ok(Json(OrderResponse::from(&result.aggregate)))
}

/// POST /orders/{id}/submit
///
/// An empty order answers 200 and stays unsubmitted.
#[tracing::instrument(skip(state))]
pub async fn submit<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: AggregateId = id.parse()?;

    let result = state
        .order_service
        .submit_order(SubmitOrder::new(order_id))
        .await?;

    Ok(Json(OrderResponse::from(&result.aggregate)))
}

/// POST /orders/{id}/ship
#[tracing::instrument(skip(state))]
pub async fn ship<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: AggregateId = id.parse()?;

    let result = state
        .order_service
        .ship_order(ShipOrder::new(order_id))
        .await?;

    Ok(Json(OrderResponse::from(&result.aggregate)))
}

/// GET /orders/{id}/events — list all events for an order aggregate.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let order_id: AggregateId = id.parse()?;

    let envelopes = state
        .event_store
        .get_events_for_aggregate(order_id)
        .await
        .map_err(domain::DomainError::from)?;

    if envelopes.is_empty() {
        return Err(ApiError::NotFound(format!("Order {id} not found")));
    }

    Ok(Json(
        envelopes
            .into_iter()
            .map(EventEnvelopeResponse::from)
            .collect(),
    ))
}
