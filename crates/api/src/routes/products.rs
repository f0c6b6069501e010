//! Product catalogue endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, CreateProduct, Money, Product};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub serial_number: i64,
    pub cost_in_cents: i64,
    pub amount_in_stock: u32,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub serial_number: i64,
    pub cost_in_cents: i64,
    pub amount_in_stock: u32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id().map(|id| id.to_string()).unwrap_or_default(),
            name: product.name().to_string(),
            serial_number: product.serial_number(),
            cost_in_cents: product.cost_in_cents(),
            amount_in_stock: product.amount_in_stock(),
            version: product.version().as_i64(),
            created_at: product.created_at(),
            updated_at: product.updated_at(),
        }
    }
}

/// POST /products — register a product with its initial stock.
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let cmd = CreateProduct::new(
        req.name,
        req.serial_number,
        Money::from_cents(req.cost_in_cents),
        req.amount_in_stock,
    );
    let result = state.order_service.products().create_product(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse::from(&result.aggregate)),
    ))
}

/// GET /products — every product in creation order.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.order_service.products().list_products().await?;
    Ok(Json(products.iter().map(ProductResponse::from).collect()))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: AggregateId = id.parse()?;
    let product = state
        .order_service
        .products()
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(ProductResponse::from(&product)))
}
