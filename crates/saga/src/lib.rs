//! Saga pattern implementation for order creation.
//!
//! The order-creation saga runs these steps through a circuit breaker each:
//! 1. Reserve stock for every line item, in submission order
//! 2. Process payment
//! 3. Finalize: mark the order PAID and publish a new-order event
//!
//! If a step fails, every reservation recorded so far is released and the
//! order is marked CANCELED before the failure is returned.

pub mod breaker;
pub mod compensation;
pub mod error;
pub mod orchestrator;
pub mod order_fulfillment;
pub mod services;
pub mod state;

pub use breaker::{BreakerError, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use compensation::Compensation;
pub use error::{Result, SagaError, StepError};
pub use orchestrator::{SagaConfig, SagaOrchestrator};
pub use order_fulfillment::SagaStep;
pub use services::{
    ChargeRequest, InventoryService, LedgerInventory, MockPaymentGateway, PaymentReceipt,
    PaymentService,
};
pub use state::SagaPhase;
