//! Order storage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use super::{Order, OrderStatus};
use crate::error::{DomainError, Result};

/// Storage for orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Stores a new order. Fails with `DuplicateOrder` if the ID is taken.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Overwrites an existing order. Fails with `OrderNotFound` if absent.
    async fn save(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists orders oldest first, optionally filtered by status.
    async fn list(
        &self,
        status: Option<OrderStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Order>>;
}

/// In-memory order repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id()) {
            return Err(DomainError::DuplicateOrder(order.id()));
        }
        orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        let slot = orders
            .get_mut(&order.id())
            .ok_or(DomainError::OrderNotFound(order.id()))?;
        *slot = order.clone();
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<&Order> = orders
            .values()
            .filter(|order| status.is_none_or(|s| order.status() == s))
            .collect();
        matching.sort_by_key(|order| (order.created_at(), order.id().as_uuid()));

        Ok(matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use common::UserId;

    use super::*;
    use crate::order::{Money, OrderItem};

    fn order() -> Order {
        Order::new(
            UserId::new("user-1"),
            vec![OrderItem::new("SKU-001", 1, Money::from_cents(100))],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = InMemoryOrderRepository::new();
        let order = order();
        repo.insert(&order).await.unwrap();

        assert_eq!(repo.get(order.id()).await.unwrap(), Some(order));
        assert!(repo.get(OrderId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_fails() {
        let repo = InMemoryOrderRepository::new();
        let order = order();
        repo.insert(&order).await.unwrap();

        let result = repo.insert(&order).await;
        assert!(matches!(result, Err(DomainError::DuplicateOrder(id)) if id == order.id()));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let repo = InMemoryOrderRepository::new();
        let mut order = order();
        repo.insert(&order).await.unwrap();

        order.mark_paid().unwrap();
        repo.save(&order).await.unwrap();

        let stored = repo.get(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_save_unknown_fails() {
        let repo = InMemoryOrderRepository::new();
        let result = repo.save(&order()).await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let repo = InMemoryOrderRepository::new();
        for i in 0..5 {
            let mut order = order();
            if i % 2 == 0 {
                order.mark_paid().unwrap();
            }
            repo.insert(&order).await.unwrap();
        }

        assert_eq!(repo.len().await, 5);
        assert_eq!(repo.list(None, 0, 10).await.unwrap().len(), 5);
        assert_eq!(repo.list(None, 3, 10).await.unwrap().len(), 2);
        assert_eq!(repo.list(None, 0, 2).await.unwrap().len(), 2);

        let paid = repo.list(Some(OrderStatus::Paid), 0, 10).await.unwrap();
        assert_eq!(paid.len(), 3);
        assert!(paid.iter().all(|o| o.status() == OrderStatus::Paid));
    }
}
