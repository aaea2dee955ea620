//! Stock ledger for the order fulfillment services.
//!
//! One [`StockRecord`] per product holds the current quantity and a version
//! counter. Every mutation goes through a single conditional write
//! ([`StockStore::compare_and_set`]) that only applies when the stored
//! version still equals the version read beforehand. Losing writers get
//! [`InventoryError::Conflict`] and must retry the whole read-modify-write;
//! [`retry_on_conflict`] does that a bounded number of times.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod retry;
pub mod store;

pub use common::ProductId;
pub use error::{InventoryError, Result};
pub use ledger::StockLedger;
pub use memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use record::{StockRecord, Version};
pub use retry::{RetryPolicy, retry_on_conflict};
pub use store::StockStore;
