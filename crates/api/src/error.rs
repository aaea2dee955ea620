//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};
use inventory::InventoryError;
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Stock ledger error.
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    /// Saga execution error.
    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => domain_status(err),
            ApiError::Inventory(err) => inventory_status(err),
            ApiError::Saga(err) => saga_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(error = %message, %status, "request failed");
        } else {
            tracing::debug!(error = %message, %status, "request rejected");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Order(OrderError::InvalidStateTransition { .. }) => StatusCode::CONFLICT,
        DomainError::Order(_) => StatusCode::BAD_REQUEST,
        DomainError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::DuplicateOrder(_) => StatusCode::CONFLICT,
    }
}

fn inventory_status(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::NotFound(_) | InventoryError::InsufficientStock { .. } => {
            StatusCode::NOT_FOUND
        }
        InventoryError::Conflict { .. } | InventoryError::AlreadyExists(_) => StatusCode::CONFLICT,
        InventoryError::InvalidQuantity { .. } | InventoryError::OutOfRange { .. } => {
            StatusCode::BAD_REQUEST
        }
        InventoryError::Database(_) | InventoryError::Migration(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn saga_status(err: &SagaError) -> StatusCode {
    match err {
        // POST /orders answers a compensated saga with the canceled order.
        SagaError::Compensated { .. } => StatusCode::CONFLICT,
        SagaError::InvalidState { .. } => StatusCode::CONFLICT,
        SagaError::Domain(err) => domain_status(err),
        SagaError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
