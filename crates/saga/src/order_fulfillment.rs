//! Step plan of the order-creation saga.

use common::ProductId;
use domain::Order;

use crate::state::SagaPhase;

/// The saga type identifier for order creation.
pub const SAGA_TYPE: &str = "OrderCreation";

/// Step name: Reserve stock for one line item.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Step name: Process payment for the order.
pub const STEP_PROCESS_PAYMENT: &str = "process_payment";

/// Step name: Persist the PAID order.
pub const STEP_FINALIZE: &str = "finalize";

/// One remote step of the saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaStep {
    ReserveStock {
        product_id: ProductId,
        quantity: u32,
    },
    ProcessPayment,
}

impl SagaStep {
    /// Builds the ordered step list: one reservation per line item in
    /// submission order, then payment.
    pub fn plan(order: &Order) -> Vec<SagaStep> {
        order
            .items()
            .iter()
            .map(|item| SagaStep::ReserveStock {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .chain(std::iter::once(SagaStep::ProcessPayment))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            SagaStep::ReserveStock { .. } => STEP_RESERVE_STOCK,
            SagaStep::ProcessPayment => STEP_PROCESS_PAYMENT,
        }
    }

    /// The phase the saga is in while this step runs.
    pub fn phase(&self) -> SagaPhase {
        match self {
            SagaStep::ReserveStock { .. } => SagaPhase::Reserving,
            SagaStep::ProcessPayment => SagaPhase::Paying,
        }
    }
}
