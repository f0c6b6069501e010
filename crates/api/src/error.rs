//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ParseAggregateIdError;
use domain::{DomainError, OrderError, ProductError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => domain_error_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) => msg,
            ApiError::Domain(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, "internal server error");
                }
                err.to_string()
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Product(product_err) => match product_err {
            ProductError::OutOfStock { .. } | ProductError::StockOverflow { .. } => {
                StatusCode::CONFLICT
            }
            ProductError::NameRequired
            | ProductError::NegativeCost { .. }
            | ProductError::AlreadyCreated => StatusCode::BAD_REQUEST,
        },
        DomainError::Order(order_err) => match order_err {
            OrderError::InvalidProductAddition { .. }
            | OrderError::InvalidProductRemoval { .. }
            | OrderError::InvalidStateTransition { .. }
            | OrderError::TotalOverflow { .. } => StatusCode::CONFLICT,
            OrderError::ProductNotInOrder { .. } => StatusCode::NOT_FOUND,
            OrderError::AlreadyCreated => StatusCode::BAD_REQUEST,
        },
        DomainError::AggregateNotFound { .. } => StatusCode::NOT_FOUND,
        err if err.is_conflict() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ParseAggregateIdError> for ApiError {
    fn from(err: ParseAggregateIdError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
