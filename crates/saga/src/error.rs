//! Saga error types.

use std::time::Duration;

use common::{OrderId, ProductId};
use domain::{DomainError, Order, OrderStatus};
use inventory::InventoryError;
use thiserror::Error;

/// Failure of a single saga step (one remote call).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("product not found: {product_id}")]
    NotFound { product_id: ProductId },

    #[error("insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Lost the version race on every allowed attempt.
    #[error("concurrent update conflict on {product_id}")]
    Conflict { product_id: ProductId },

    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// The dependency could not be reached or failed internally.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Rejected by an open circuit breaker; the call was never made.
    #[error("circuit breaker '{breaker}' is open")]
    BreakerOpen { breaker: String },

    #[error("step timed out after {0:?}")]
    TimedOut(Duration),
}

impl StepError {
    /// True for failures that should feed a circuit breaker.
    ///
    /// A dependency that answered and said no (not found, insufficient
    /// stock, conflict, declined) was reachable, so it does not count.
    pub fn counts_against_breaker(&self) -> bool {
        matches!(self, StepError::Unavailable(_) | StepError::TimedOut(_))
    }

    pub fn is_breaker_open(&self) -> bool {
        matches!(self, StepError::BreakerOpen { .. })
    }
}

impl From<InventoryError> for StepError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound(product_id) => StepError::NotFound { product_id },
            InventoryError::InsufficientStock {
                product_id,
                requested,
                available,
            } => StepError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            InventoryError::Conflict { product_id, .. } => StepError::Conflict { product_id },
            InventoryError::InvalidQuantity { quantity } => StepError::InvalidQuantity { quantity },
            other => StepError::Unavailable(other.to_string()),
        }
    }
}

/// Errors returned by the orchestrator.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A step failed; recorded reservations were released and the order
    /// was canceled. Carries the final order.
    #[error("saga step '{step}' failed: {cause}")]
    Compensated {
        step: &'static str,
        cause: StepError,
        order: Box<Order>,
    },

    /// The order was not PENDING when the saga was asked to run it.
    #[error("order {order_id} is {status}, expected PENDING")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The task running the saga panicked or was cancelled by the runtime.
    #[error("saga task did not finish: {0}")]
    Aborted(String),
}

impl SagaError {
    /// The terminal order, when the saga got far enough to produce one.
    pub fn order(&self) -> Option<&Order> {
        match self {
            SagaError::Compensated { order, .. } => Some(order.as_ref()),
            _ => None,
        }
    }

    /// The step error that triggered compensation.
    pub fn cause(&self) -> Option<&StepError> {
        match self {
            SagaError::Compensated { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use inventory::Version;

    #[test]
    fn test_inventory_errors_map_to_step_errors() {
        let sku = ProductId::new("SKU-001");

        assert_eq!(
            StepError::from(InventoryError::NotFound(sku.clone())),
            StepError::NotFound {
                product_id: sku.clone()
            }
        );
        assert_eq!(
            StepError::from(InventoryError::Conflict {
                product_id: sku.clone(),
                expected: Version::first(),
            }),
            StepError::Conflict {
                product_id: sku.clone()
            }
        );
        assert!(matches!(
            StepError::from(InventoryError::AlreadyExists(sku)),
            StepError::Unavailable(_)
        ));
    }

    #[test]
    fn test_business_rejections_do_not_trip_breakers() {
        let declined = StepError::PaymentDeclined("card".into());
        assert!(!declined.counts_against_breaker());

        let down = StepError::Unavailable("connection refused".into());
        assert!(down.counts_against_breaker());

        let slow = StepError::TimedOut(Duration::from_secs(1));
        assert!(slow.counts_against_breaker());

        let open = StepError::BreakerOpen {
            breaker: "inventory".into(),
        };
        assert!(open.is_breaker_open());
        assert!(!open.counts_against_breaker());
    }
}
