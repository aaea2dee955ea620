//! Compensating actions recorded while a saga runs.

use common::ProductId;
use serde::Serialize;

/// Undo entry for a step that completed.
///
/// The orchestrator pushes one entry per successful step and, on failure,
/// executes exactly the recorded entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compensation {
    /// Give reserved units back to the ledger.
    ReleaseStock {
        product_id: ProductId,
        quantity: u32,
    },
}

impl std::fmt::Display for Compensation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compensation::ReleaseStock {
                product_id,
                quantity,
            } => write!(f, "release {quantity} x {product_id}"),
        }
    }
}
