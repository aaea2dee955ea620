use async_trait::async_trait;

use crate::{ProductId, Result, StockRecord, Version};

/// Storage for stock records.
///
/// Implementations must be thread-safe (Send + Sync). The only primitive
/// used for reservations is [`compare_and_set`](StockStore::compare_and_set);
/// no lock is held between a caller's read and its conditional write.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Reads the current record for a product.
    async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>>;

    /// Creates a record at version 1.
    ///
    /// Fails with `AlreadyExists` if the product already has a record.
    async fn insert(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord>;

    /// Atomically sets `quantity` and increments the version, but only if the
    /// stored version still equals `expected`.
    ///
    /// Equivalent to `UPDATE ... SET stock = :q, version = version + 1
    /// WHERE product_id = :id AND version = :expected`. Returns the updated
    /// record, or `None` when zero rows matched (the record changed since it
    /// was read, or it no longer exists).
    async fn compare_and_set(
        &self,
        product_id: &ProductId,
        expected: Version,
        quantity: u32,
    ) -> Result<Option<StockRecord>>;

    /// Sets `quantity` unconditionally, creating the record if absent.
    ///
    /// Existing records always get a version bump, so any writer holding the
    /// previous version will conflict.
    async fn upsert(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord>;

    /// Lists records ordered by product ID.
    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<StockRecord>>;
}
