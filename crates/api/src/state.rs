//! Shared application state accessible from all handlers.

use std::sync::Arc;

use common::BroadcastPublisher;
use domain::{InMemoryOrderRepository, OrderService};
use inventory::{RetryPolicy, StockLedger, StockStore};
use saga::{LedgerInventory, MockPaymentGateway, SagaOrchestrator};

use crate::config::Config;

/// Stock ledger as wired into the server.
pub type Ledger<S> = StockLedger<S, BroadcastPublisher>;

/// Saga orchestrator as wired into the server.
pub type Orchestrator<S> = SagaOrchestrator<
    InMemoryOrderRepository,
    LedgerInventory<S, BroadcastPublisher>,
    MockPaymentGateway,
    BroadcastPublisher,
>;

pub struct AppState<S: StockStore> {
    pub saga: Arc<Orchestrator<S>>,
    pub ledger: Arc<Ledger<S>>,
    pub payment: MockPaymentGateway,
    pub publisher: BroadcastPublisher,
    /// Applied to direct reservations made through the inventory routes.
    pub conflict_retry: RetryPolicy,
}

impl<S: StockStore> AppState<S> {
    pub fn orders(&self) -> &OrderService<InMemoryOrderRepository> {
        self.saga.orders()
    }
}

/// Wires the ledger over `store`, the in-memory order repository, the mock
/// payment gateway and a broadcast publisher into one state.
pub fn create_default_state<S: StockStore + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let publisher = BroadcastPublisher::default();
    let ledger = Arc::new(
        StockLedger::new(store, publisher.clone()).with_release_retry(config.conflict_retry()),
    );
    let inventory = LedgerInventory::new(ledger.clone()).with_reserve_retry(config.conflict_retry());
    let payment = MockPaymentGateway::new(config.payment_latency);

    let saga = Arc::new(SagaOrchestrator::new(
        OrderService::new(InMemoryOrderRepository::new()),
        inventory,
        payment.clone(),
        publisher.clone(),
        config.saga_config(),
    ));

    Arc::new(AppState {
        saga,
        ledger,
        payment,
        publisher,
        conflict_retry: config.conflict_retry(),
    })
}
