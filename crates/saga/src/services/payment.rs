//! Payment capability and a mock gateway.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Money, Order};

use crate::error::StepError;

/// What the saga asks the gateway to charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    /// Test hook: the gateway declines this charge after its usual latency.
    pub simulate_failure: bool,
}

impl ChargeRequest {
    pub fn for_order(order: &Order, simulate_failure: bool) -> Self {
        Self {
            order_id: order.id(),
            user_id: order.user_id().clone(),
            amount: order.total_amount(),
            simulate_failure,
        }
    }
}

/// Result of a successful payment charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// The payment ID assigned by the gateway.
    pub payment_id: String,
    pub order_id: OrderId,
    pub amount: Money,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the user for an order.
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, StepError>;
}

#[derive(Debug, Default)]
struct GatewayState {
    attempts: usize,
    receipts: Vec<PaymentReceipt>,
}

/// Mock payment gateway.
///
/// Sleeps for the configured latency, then accepts every charge unless the
/// request asks for a simulated failure.
#[derive(Debug, Clone, Default)]
pub struct MockPaymentGateway {
    latency: Duration,
    state: Arc<Mutex<GatewayState>>,
}

impl MockPaymentGateway {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            state: Arc::default(),
        }
    }

    /// Number of charge calls received, accepted or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Number of accepted charges.
    pub fn payment_count(&self) -> usize {
        self.lock().receipts.len()
    }

    pub fn receipts(&self) -> Vec<PaymentReceipt> {
        self.lock().receipts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentService for MockPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, amount = %request.amount))]
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, StepError> {
        self.lock().attempts += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if request.simulate_failure {
            tracing::info!("payment rejected (simulated)");
            return Err(StepError::PaymentDeclined("payment rejected".to_string()));
        }

        let mut state = self.lock();
        let receipt = PaymentReceipt {
            payment_id: format!("PAY-{:04}", state.receipts.len() + 1),
            order_id: request.order_id,
            amount: request.amount,
        };
        state.receipts.push(receipt.clone());
        tracing::info!(payment_id = %receipt.payment_id, "payment successful");
        Ok(receipt)
    }
}
