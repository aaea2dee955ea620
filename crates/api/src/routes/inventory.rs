//! Stock ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use common::ProductId;
use inventory::{StockRecord, StockStore, retry_on_conflict};
use serde::{Deserialize, Serialize};

use super::Pagination;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct StockLevelRequest {
    pub product_id: String,
    pub stock: u32,
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct InventoryResponse {
    pub product_id: String,
    pub stock: u32,
    pub available: bool,
    pub version: i64,
    pub updated_at: String,
}

impl From<StockRecord> for InventoryResponse {
    fn from(record: StockRecord) -> Self {
        Self {
            product_id: record.product_id.to_string(),
            stock: record.quantity,
            available: record.is_available(),
            version: record.version.as_i64(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// POST /inventory: declare a product's initial stock.
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id))]
pub async fn declare<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<StockLevelRequest>,
) -> Result<(StatusCode, Json<InventoryResponse>), ApiError> {
    let product_id = parse_product_id(req.product_id)?;
    let record = state.ledger.declare(&product_id, req.stock).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// POST /inventory/reserve
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id, quantity = req.quantity))]
pub async fn reserve<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let product_id = parse_product_id(req.product_id)?;
    let record = retry_on_conflict(&state.conflict_retry, || {
        state.ledger.reserve(&product_id, req.quantity)
    })
    .await?;
    Ok(Json(record.into()))
}

/// POST /inventory/release
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id, quantity = req.quantity))]
pub async fn release<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let product_id = parse_product_id(req.product_id)?;
    let record = state.ledger.release(&product_id, req.quantity).await?;
    Ok(Json(record.into()))
}

/// GET /admin/inventory?skip=&limit=
#[tracing::instrument(skip(state, page))]
pub async fn list<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<InventoryResponse>>, ApiError> {
    let records = state.ledger.list(page.skip, page.limit).await?;
    Ok(Json(records.into_iter().map(InventoryResponse::from).collect()))
}

/// POST /admin/inventory/correction: set stock absolutely, creating the record if needed.
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id, stock = req.stock))]
pub async fn correct<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<StockLevelRequest>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let product_id = parse_product_id(req.product_id)?;
    let record = state.ledger.correct(&product_id, req.stock).await?;
    Ok(Json(record.into()))
}

fn parse_product_id(raw: String) -> Result<ProductId, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest("product_id is required".to_string()));
    }
    Ok(ProductId::new(raw))
}
