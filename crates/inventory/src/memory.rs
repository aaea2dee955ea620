use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{InventoryError, ProductId, Result, StockRecord, Version, store::StockStore};

/// In-memory stock store.
///
/// Provides the same conditional-write semantics as the PostgreSQL store:
/// the version check and the write happen under one write lock.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    records: Arc<RwLock<BTreeMap<ProductId, StockRecord>>>,
}

impl InMemoryStockStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of products with a record.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no product has a record.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        Ok(self.records.read().await.get(product_id).cloned())
    }

    async fn insert(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(product_id) {
            return Err(InventoryError::AlreadyExists(product_id.clone()));
        }

        let record = StockRecord::new(product_id.clone(), quantity);
        records.insert(product_id.clone(), record.clone());
        Ok(record)
    }

    async fn compare_and_set(
        &self,
        product_id: &ProductId,
        expected: Version,
        quantity: u32,
    ) -> Result<Option<StockRecord>> {
        let mut records = self.records.write().await;
        let Some(current) = records.get_mut(product_id) else {
            return Ok(None);
        };

        if current.version != expected {
            return Ok(None);
        }

        *current = current.advanced(quantity);
        Ok(Some(current.clone()))
    }

    async fn upsert(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        let mut records = self.records.write().await;
        let record = match records.get(product_id) {
            Some(current) => current.advanced(quantity),
            None => StockRecord::new(product_id.clone(), quantity),
        };
        records.insert(product_id.clone(), record.clone());
        Ok(record)
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<StockRecord>> {
        let records = self.records.read().await;
        Ok(records.values().skip(offset).take(limit).cloned().collect())
    }
}
