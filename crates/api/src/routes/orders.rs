//! Order placement and administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{OrderId, UserId};
use domain::{Money, Order, OrderItem, OrderStatus};
use inventory::StockStore;
use saga::SagaError;
use serde::{Deserialize, Serialize};

use super::Pagination;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
    /// Makes the mock payment gateway decline the charge.
    #[serde(default)]
    pub simulate_failure: bool,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price_cents: i64,
}

#[derive(Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub new_status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            total_cents: order.total_amount().cents(),
            created_at: order.created_at().to_rfc3339(),
            updated_at: order.updated_at().to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders: store a PENDING order and run the order-creation saga on it.
///
/// Responds with the final order. A saga that failed and compensated still
/// answers 200 with the CANCELED order; only requests that never produced an
/// order are errors. The saga runs on its own task, so a client that hangs
/// up mid-saga does not leave stock reserved.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id, item_count = req.items.len()))]
pub async fn create<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let items = req
        .items
        .into_iter()
        .map(|item| {
            OrderItem::new(
                item.product_id,
                item.quantity,
                Money::from_cents(item.unit_price_cents),
            )
        })
        .collect();

    let order = match state
        .saga
        .place_order_detached(UserId::new(req.user_id), items, req.simulate_failure)
        .await
    {
        Ok(order) => order,
        Err(SagaError::Compensated { step, cause, order }) => {
            tracing::info!(order_id = %order.id(), step, error = %cause, "order canceled by saga");
            *order
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders().get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /admin/orders?skip=&limit=&status=
#[tracing::instrument(skip(state, page, filter))]
pub async fn list<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(page): Query<Pagination>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let orders = state
        .orders()
        .list_orders(status, page.skip, page.limit)
        .await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// PUT /admin/orders/{id}/status?new_status=SHIPPED
///
/// Administrative override outside the saga. SHIPPED is the only status an
/// administrator can set, and only on a PAID order.
#[tracing::instrument(skip(state, update), fields(new_status = %update.new_status))]
pub async fn update_status<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(update): Query<StatusUpdate>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let new_status: OrderStatus = update.new_status.parse().map_err(ApiError::BadRequest)?;
    if new_status != OrderStatus::Shipped {
        return Err(ApiError::BadRequest(format!(
            "status can only be set to {}, got {new_status}",
            OrderStatus::Shipped
        )));
    }

    let order = state.orders().mark_shipped(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
