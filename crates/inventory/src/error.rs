use thiserror::Error;

use crate::{ProductId, Version};

/// Errors that can occur when reading or mutating stock.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The product has no stock record.
    #[error("Product not found in inventory: {0}")]
    NotFound(ProductId),

    /// The record holds less than the requested quantity. Nothing was mutated.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Another writer changed the record between read and conditional write.
    /// The caller must retry the whole operation.
    #[error("Concurrent update detected for {product_id}: version {expected} is stale")]
    Conflict {
        product_id: ProductId,
        expected: Version,
    },

    /// Reserve and release quantities must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A stock record already exists for the product.
    #[error("Inventory item for product_id='{0}' already exists")]
    AlreadyExists(ProductId),

    /// A stored or computed stock value does not fit the ledger's range.
    #[error("Stock value out of range for {product_id}: {value}")]
    OutOfRange { product_id: ProductId, value: i64 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl InventoryError {
    /// Returns true if the error is a lost CAS race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, InventoryError::Conflict { .. })
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
