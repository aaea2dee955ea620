//! Orders and their lifecycle.

mod aggregate;
mod repository;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use repository::{InMemoryOrderRepository, OrderRepository};
pub use service::OrderService;
pub use state::OrderStatus;
pub use value_objects::{Money, OrderItem};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The status machine does not allow this transition.
    #[error("Invalid state transition: cannot {action} from {current_status} state")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// Line totals do not fit the amount range.
    #[error("Order total is out of range")]
    AmountOverflow,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// User ID is required.
    #[error("User ID is required")]
    UserIdRequired,
}
