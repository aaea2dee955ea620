//! Saga orchestrator for order creation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::{EventPublisher, IntegrationEvent, OrderId, Topic, UserId};
use domain::{DomainError, Order, OrderItem, OrderRepository, OrderService, OrderStatus};

use crate::breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig};
use crate::compensation::Compensation;
use crate::error::{SagaError, StepError};
use crate::order_fulfillment::{self, SagaStep};
use crate::services::{ChargeRequest, InventoryService, PaymentService};
use crate::state::SagaPhase;

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaConfig {
    /// Upper bound on each remote call. A call that exceeds it fails the step.
    pub step_timeout: Duration,
    /// Settings for the breakers the orchestrator creates itself.
    pub breaker: CircuitBreakerConfig,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(5),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Saga-local bookkeeping for one execution.
///
/// `compensations` holds exactly the steps that succeeded so far, in the
/// order they succeeded.
struct SagaRun {
    order_id: OrderId,
    phase: SagaPhase,
    compensations: Vec<Compensation>,
}

impl SagaRun {
    fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            phase: SagaPhase::default(),
            compensations: Vec::new(),
        }
    }

    fn enter(&mut self, next: SagaPhase) {
        if self.phase == next {
            return;
        }
        debug_assert!(
            self.phase.can_advance_to(next),
            "saga phase {} cannot advance to {}",
            self.phase,
            next
        );
        tracing::debug!(order_id = %self.order_id, from = %self.phase, to = %next, "saga phase changed");
        self.phase = next;
    }
}

/// Orchestrates the order-creation saga.
///
/// Every remote call goes through the circuit breaker of its call-site and
/// is bounded by the step timeout. Breakers are shared by all sagas running
/// on this orchestrator; share the orchestrator itself with `Arc` to run
/// sagas concurrently.
pub struct SagaOrchestrator<R, I, P, E>
where
    R: OrderRepository,
    I: InventoryService,
    P: PaymentService,
    E: EventPublisher,
{
    orders: OrderService<R>,
    inventory: I,
    payment: P,
    publisher: E,
    inventory_breaker: Arc<CircuitBreaker>,
    payment_breaker: Arc<CircuitBreaker>,
    config: SagaConfig,
}

impl<R, I, P, E> SagaOrchestrator<R, I, P, E>
where
    R: OrderRepository,
    I: InventoryService,
    P: PaymentService,
    E: EventPublisher,
{
    /// Creates an orchestrator with its own `inventory` and `payment` breakers.
    pub fn new(
        orders: OrderService<R>,
        inventory: I,
        payment: P,
        publisher: E,
        config: SagaConfig,
    ) -> Self {
        Self {
            orders,
            inventory,
            payment,
            publisher,
            inventory_breaker: Arc::new(CircuitBreaker::new("inventory", config.breaker)),
            payment_breaker: Arc::new(CircuitBreaker::new("payment", config.breaker)),
            config,
        }
    }

    /// Replaces the breakers, e.g. to share them with other callers of the
    /// same dependencies.
    pub fn with_breakers(
        mut self,
        inventory: Arc<CircuitBreaker>,
        payment: Arc<CircuitBreaker>,
    ) -> Self {
        self.inventory_breaker = inventory;
        self.payment_breaker = payment;
        self
    }

    pub fn orders(&self) -> &OrderService<R> {
        &self.orders
    }

    pub fn inventory_breaker(&self) -> &CircuitBreaker {
        &self.inventory_breaker
    }

    pub fn payment_breaker(&self) -> &CircuitBreaker {
        &self.payment_breaker
    }

    pub fn config(&self) -> SagaConfig {
        self.config
    }

    /// Stores a PENDING order for `user_id` and runs the saga on it.
    ///
    /// On success the PAID order is returned. On a step failure the error
    /// carries the CANCELED order.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        items: Vec<OrderItem>,
        simulate_failure: bool,
    ) -> Result<Order, SagaError> {
        let order = self.orders.create_order(user_id, items).await?;
        self.execute(order, simulate_failure).await
    }

    /// [`place_order`](Self::place_order) on its own task.
    ///
    /// Dropping the returned future (a disconnected HTTP client, a caller's
    /// timeout) does not abandon the saga: it still runs to PAID or CANCELED,
    /// releasing whatever it reserved.
    pub async fn place_order_detached(
        self: &Arc<Self>,
        user_id: UserId,
        items: Vec<OrderItem>,
        simulate_failure: bool,
    ) -> Result<Order, SagaError>
    where
        R: 'static,
        I: 'static,
        P: 'static,
        E: 'static,
    {
        let saga = Arc::clone(self);
        let task = tokio::spawn(async move {
            saga.place_order(user_id, items, simulate_failure).await
        });

        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!(error = %join_err, "saga task did not finish");
                Err(SagaError::Aborted(join_err.to_string()))
            }
        }
    }

    /// Runs the saga for a PENDING order.
    ///
    /// Reserves every item in order, then charges payment, then marks the
    /// order PAID and publishes a new-order event. If any step fails, the
    /// reservations recorded so far are released, the order is marked
    /// CANCELED, and [`SagaError::Compensated`] is returned once
    /// compensation has finished.
    #[tracing::instrument(
        skip(self, order),
        fields(saga_type = order_fulfillment::SAGA_TYPE, order_id = %order.id())
    )]
    pub async fn execute(&self, order: Order, simulate_failure: bool) -> Result<Order, SagaError> {
        if order.status() != OrderStatus::Pending {
            return Err(SagaError::InvalidState {
                order_id: order.id(),
                status: order.status(),
            });
        }

        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();
        let mut run = SagaRun::new(order.id());

        let outcome = match self.run_steps(&order, simulate_failure, &mut run).await {
            Ok(()) => self.finalize(&order, &mut run).await,
            Err(step_failure) => Err(step_failure),
        };

        let result = match outcome {
            Ok(paid) => {
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(order_id = %paid.id(), "saga completed, order paid");
                Ok(paid)
            }
            Err((step, cause)) => {
                let canceled = self.compensate(order, &mut run, step, &cause).await?;
                metrics::counter!("saga_failed").increment(1);
                Err(SagaError::Compensated {
                    step,
                    cause,
                    order: Box::new(canceled),
                })
            }
        };

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());
        result
    }

    /// Runs each step in order, recording a compensation for every step that
    /// succeeds. Stops at the first failure.
    async fn run_steps(
        &self,
        order: &Order,
        simulate_failure: bool,
        run: &mut SagaRun,
    ) -> Result<(), (&'static str, StepError)> {
        for step in SagaStep::plan(order) {
            run.enter(step.phase());
            tracing::info!(step = step.name(), "saga step started");

            match self.run_step(&step, order, simulate_failure).await {
                Ok(compensation) => {
                    tracing::info!(step = step.name(), "saga step completed");
                    run.compensations.extend(compensation);
                }
                Err(err) if err.is_breaker_open() => {
                    tracing::warn!(step = step.name(), error = %err, "saga step rejected, dependency presumed down");
                    return Err((step.name(), err));
                }
                Err(err) => {
                    tracing::warn!(step = step.name(), error = %err, "saga step failed");
                    return Err((step.name(), err));
                }
            }
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: &SagaStep,
        order: &Order,
        simulate_failure: bool,
    ) -> Result<Option<Compensation>, StepError> {
        match step {
            SagaStep::ReserveStock {
                product_id,
                quantity,
            } => {
                self.guarded(&self.inventory_breaker, || {
                    self.inventory.reserve(product_id, *quantity)
                })
                .await?;
                Ok(Some(Compensation::ReleaseStock {
                    product_id: product_id.clone(),
                    quantity: *quantity,
                }))
            }
            SagaStep::ProcessPayment => {
                let request = ChargeRequest::for_order(order, simulate_failure);
                let receipt = self
                    .guarded(&self.payment_breaker, || self.payment.charge(&request))
                    .await?;
                tracing::info!(payment_id = %receipt.payment_id, "payment accepted");
                Ok(None)
            }
        }
    }

    /// Marks the order PAID, persists it and publishes the new-order event.
    async fn finalize(
        &self,
        order: &Order,
        run: &mut SagaRun,
    ) -> Result<Order, (&'static str, StepError)> {
        run.enter(SagaPhase::Finalizing);

        let mut paid = order.clone();
        let persisted = match paid.mark_paid() {
            Ok(()) => self.orders.save(&paid).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = persisted {
            tracing::error!(%reason, "failed to persist paid order");
            return Err((
                order_fulfillment::STEP_FINALIZE,
                StepError::Unavailable(reason),
            ));
        }

        self.publisher.publish(
            Topic::Notifications,
            IntegrationEvent::NewOrder {
                order_id: paid.id(),
                user_id: paid.user_id().clone(),
                amount_cents: paid.total_amount().cents(),
            },
        );

        run.enter(SagaPhase::Completed);
        Ok(paid)
    }

    /// Executes every recorded compensation, then marks the order CANCELED.
    ///
    /// Releases bypass the inventory breaker and are bounded only by the step
    /// timeout: the failure being compensated may be the one that opened it.
    /// A failed compensation is logged and counted, and the remaining ones
    /// still run. The order ends CANCELED either way.
    async fn compensate(
        &self,
        mut order: Order,
        run: &mut SagaRun,
        failed_step: &'static str,
        cause: &StepError,
    ) -> Result<Order, SagaError> {
        run.enter(SagaPhase::Compensating);
        tracing::warn!(
            step = failed_step,
            %cause,
            pending = run.compensations.len(),
            "compensating saga"
        );

        for compensation in run.compensations.drain(..) {
            let result = match &compensation {
                Compensation::ReleaseStock {
                    product_id,
                    quantity,
                } => {
                    self.bounded(self.inventory.release(product_id, *quantity))
                        .await
                }
            };

            match result {
                Ok(()) => tracing::info!(%compensation, "compensation applied"),
                Err(err) => {
                    metrics::counter!("saga_compensation_failures_total").increment(1);
                    tracing::error!(%compensation, error = %err, "compensation failed");
                }
            }
        }

        order.mark_canceled().map_err(DomainError::from)?;
        self.orders.save(&order).await?;
        run.enter(SagaPhase::Compensated);

        tracing::warn!(order_id = %order.id(), reason = %cause, "saga failed, order canceled");
        Ok(order)
    }

    /// Runs a remote call through `breaker`, bounded by the step timeout.
    ///
    /// Only unavailability and timeouts count against the breaker.
    async fn guarded<T, F, Fut>(&self, breaker: &CircuitBreaker, op: F) -> Result<T, StepError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        breaker
            .execute_classified(|| self.bounded(op()), StepError::counts_against_breaker)
            .await
            .map_err(|err| match err {
                BreakerError::Open { name } => StepError::BreakerOpen { breaker: name },
                BreakerError::Inner(err) => err,
            })
    }

    /// Bounds a remote call by the step timeout.
    async fn bounded<T, Fut>(&self, call: Fut) -> Result<T, StepError>
    where
        Fut: Future<Output = Result<T, StepError>>,
    {
        let timeout = self.config.step_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StepError::TimedOut(timeout)),
        }
    }
}
