//! Order root entity.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{Money, OrderError, OrderItem, OrderStatus};

/// An order placed by a user.
///
/// Line items and the total are fixed at construction; only the status
/// moves afterwards, and only forwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    items: Vec<OrderItem>,
    status: OrderStatus,
    total_amount: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a PENDING order.
    ///
    /// Items keep the order they were submitted in; that is the order the
    /// saga reserves them in.
    pub fn new(user_id: UserId, items: Vec<OrderItem>) -> Result<Self, OrderError> {
        if user_id.as_str().trim().is_empty() {
            return Err(OrderError::UserIdRequired);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    price: item.unit_price.cents(),
                });
            }
        }

        let total_amount = items
            .iter()
            .try_fold(Money::zero(), |total, item| {
                item.total_price().and_then(|line| total.checked_add(line))
            })
            .ok_or(OrderError::AmountOverflow)?;
        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            user_id,
            items,
            status: OrderStatus::Pending,
            total_amount,
            created_at: now,
            updated_at: now,
        })
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the line items in submission order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// Transitions
impl Order {
    /// PENDING → PAID.
    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::can_mark_paid, OrderStatus::Paid, "mark paid")
    }

    /// PENDING → CANCELED.
    pub fn mark_canceled(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::can_cancel, OrderStatus::Canceled, "cancel")
    }

    /// PENDING → FAILED.
    pub fn mark_failed(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::can_fail, OrderStatus::Failed, "fail")
    }

    /// PAID → SHIPPED.
    pub fn mark_shipped(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::can_ship, OrderStatus::Shipped, "ship")
    }

    fn transition(
        &mut self,
        allowed: fn(&OrderStatus) -> bool,
        next: OrderStatus,
        action: &'static str,
    ) -> Result<(), OrderError> {
        if !allowed(&self.status) {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
