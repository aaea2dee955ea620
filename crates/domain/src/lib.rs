//! Order domain for the fulfillment services.
//!
//! This crate provides:
//! - `Order` with its immutable line items and total amount
//! - `OrderStatus` state machine (PENDING, PAID, CANCELED, FAILED, SHIPPED)
//! - `OrderRepository` storage trait with an in-memory implementation
//! - `OrderService` for placing, reading, listing and shipping orders

pub mod error;
pub mod order;

pub use common::{OrderId, ProductId, UserId};
pub use error::{DomainError, Result};
pub use order::{
    InMemoryOrderRepository, Money, Order, OrderError, OrderItem, OrderRepository, OrderService,
    OrderStatus,
};
