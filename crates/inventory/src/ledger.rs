//! Stock ledger service: reserve, release, declare and correct stock.

use common::{EventPublisher, IntegrationEvent, Topic};

use crate::retry::{RetryPolicy, retry_on_conflict};
use crate::{InventoryError, ProductId, Result, StockRecord, store::StockStore};

/// Owns stock records and publishes an inventory update after every change.
///
/// `reserve` makes exactly one read-then-conditional-write attempt and
/// reports a lost race as [`InventoryError::Conflict`]; retrying is the
/// caller's job. `release` is a compensating action and retries conflicts
/// itself under the configured [`RetryPolicy`].
pub struct StockLedger<S: StockStore, P: EventPublisher> {
    store: S,
    publisher: P,
    release_retry: RetryPolicy,
}

impl<S: StockStore, P: EventPublisher> StockLedger<S, P> {
    /// Creates a ledger over `store` that publishes through `publisher`.
    pub fn new(store: S, publisher: P) -> Self {
        Self {
            store,
            publisher,
            release_retry: RetryPolicy::default(),
        }
    }

    /// Sets the retry policy used by `release`.
    pub fn with_release_retry(mut self, policy: RetryPolicy) -> Self {
        self.release_retry = policy;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates the stock record for a product at version 1.
    #[tracing::instrument(skip(self))]
    pub async fn declare(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        let record = self.store.insert(product_id, quantity).await?;
        tracing::info!(%product_id, quantity, "stock declared");
        Ok(record)
    }

    /// Takes `quantity` units out of stock with a single compare-and-set attempt.
    ///
    /// Fails with `NotFound` if the product has no record, with
    /// `InsufficientStock` (record untouched) if fewer units remain, and with
    /// `Conflict` if another writer changed the record after it was read.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        ensure_positive(quantity)?;

        let record = self
            .store
            .get(product_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(product_id.clone()))?;

        if record.quantity < quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: record.quantity,
            });
        }

        let remaining = record.quantity - quantity;
        let Some(updated) = self
            .store
            .compare_and_set(product_id, record.version, remaining)
            .await?
        else {
            metrics::counter!("inventory_conflicts_total").increment(1);
            tracing::debug!(%product_id, expected = %record.version, "reserve lost version race");
            return Err(InventoryError::Conflict {
                product_id: product_id.clone(),
                expected: record.version,
            });
        };

        metrics::counter!("inventory_reservations_total").increment(1);
        tracing::info!(%product_id, quantity, remaining = updated.quantity, "stock reserved");
        self.publish_update(&updated);
        Ok(updated)
    }

    /// Puts `quantity` units back into stock.
    ///
    /// Always additive. Conflicts are retried under the release policy; a
    /// `Conflict` is only returned once that policy is exhausted.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        ensure_positive(quantity)?;

        let updated = retry_on_conflict(&self.release_retry, || {
            self.release_once(product_id, quantity)
        })
        .await?;

        metrics::counter!("inventory_releases_total").increment(1);
        tracing::info!(%product_id, quantity, stock = updated.quantity, "stock released");
        self.publish_update(&updated);
        Ok(updated)
    }

    /// Sets the stock of a product absolutely, creating the record if needed.
    ///
    /// Always bumps the version, so reservations racing with a correction
    /// conflict and re-read the corrected value.
    #[tracing::instrument(skip(self))]
    pub async fn correct(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        let record = self.store.upsert(product_id, quantity).await?;
        tracing::info!(%product_id, quantity, version = %record.version, "stock corrected");
        self.publish_update(&record);
        Ok(record)
    }

    /// Reads the current record for a product.
    pub async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        self.store.get(product_id).await
    }

    /// Lists records ordered by product ID.
    pub async fn list(&self, offset: usize, limit: usize) -> Result<Vec<StockRecord>> {
        self.store.list(offset, limit).await
    }

    async fn release_once(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        let record = self
            .store
            .get(product_id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(product_id.clone()))?;

        let restored =
            record
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| InventoryError::OutOfRange {
                    product_id: product_id.clone(),
                    value: i64::from(record.quantity) + i64::from(quantity),
                })?;

        match self
            .store
            .compare_and_set(product_id, record.version, restored)
            .await?
        {
            Some(updated) => Ok(updated),
            None => {
                metrics::counter!("inventory_conflicts_total").increment(1);
                Err(InventoryError::Conflict {
                    product_id: product_id.clone(),
                    expected: record.version,
                })
            }
        }
    }

    fn publish_update(&self, record: &StockRecord) {
        self.publisher.publish(
            Topic::InventoryUpdates,
            IntegrationEvent::inventory_update(record.product_id.clone(), record.quantity),
        );
    }
}

fn ensure_positive(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(InventoryError::InvalidQuantity { quantity });
    }
    Ok(())
}
