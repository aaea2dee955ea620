//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use inventory::StockStore;
use saga::CircuitState;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub breakers: BreakerStates,
}

#[derive(Serialize)]
pub struct BreakerStates {
    pub inventory: CircuitState,
    pub payment: CircuitState,
}

/// GET /health: process liveness plus the state of each saga breaker.
pub async fn check<S: StockStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        breakers: BreakerStates {
            inventory: state.saga.inventory_breaker().state(),
            payment: state.saga.payment_breaker().state(),
        },
    })
}
