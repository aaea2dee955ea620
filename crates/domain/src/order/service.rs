//! Order service providing a simplified API for order operations.

use common::{OrderId, UserId};

use super::{Order, OrderItem, OrderRepository, OrderStatus};
use crate::error::{DomainError, Result};

/// Service for managing orders.
///
/// Wraps an [`OrderRepository`] and enforces the status machine on every
/// write. Saga-driven transitions (PAID, CANCELED) are applied by the
/// orchestrator and persisted through [`OrderService::save`].
pub struct OrderService<R: OrderRepository> {
    repository: R,
}

impl<R: OrderRepository> OrderService<R> {
    /// Creates a new order service over the given repository.
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Validates and stores a new PENDING order.
    #[tracing::instrument(skip(self, items), fields(item_count = items.len()))]
    pub async fn create_order(&self, user_id: UserId, items: Vec<OrderItem>) -> Result<Order> {
        let order = Order::new(user_id, items)?;
        self.repository.insert(&order).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id(), total = %order.total_amount(), "order created");
        Ok(order)
    }

    /// Persists a status change made on an order.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id(), status = %order.status()))]
    pub async fn save(&self, order: &Order) -> Result<()> {
        self.repository.save(order).await
    }

    /// Gets an order by ID.
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.repository
            .get(id)
            .await?
            .ok_or(DomainError::OrderNotFound(id))
    }

    /// Lists orders, optionally filtered by status.
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Order>> {
        self.repository.list(status, offset, limit).await
    }

    /// Administrative override: marks a PAID order as SHIPPED.
    ///
    /// Bypasses the saga. Any other current status is rejected with an
    /// invalid transition error and the order is left unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn mark_shipped(&self, id: OrderId) -> Result<Order> {
        let mut order = self.get_order(id).await?;
        order.mark_shipped()?;
        self.repository.save(&order).await?;

        tracing::info!(order_id = %id, "order marked as shipped");
        Ok(order)
    }
}
