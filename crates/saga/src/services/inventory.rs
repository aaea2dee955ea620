//! Inventory capability and its stock-ledger adapter.

use std::sync::Arc;

use async_trait::async_trait;
use common::{EventPublisher, ProductId};
use inventory::{RetryPolicy, StockLedger, StockStore, retry_on_conflict};

use crate::error::StepError;

/// Stock operations the saga needs.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Takes `quantity` units of a product out of stock.
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<(), StepError>;

    /// Gives `quantity` units back.
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<(), StepError>;
}

/// [`InventoryService`] backed by a [`StockLedger`].
///
/// Retries a reservation that lost a version race under `reserve_retry`,
/// re-reading the record each time. Release retries inside the ledger.
pub struct LedgerInventory<S: StockStore, P: EventPublisher> {
    ledger: Arc<StockLedger<S, P>>,
    reserve_retry: RetryPolicy,
}

impl<S: StockStore, P: EventPublisher> LedgerInventory<S, P> {
    pub fn new(ledger: Arc<StockLedger<S, P>>) -> Self {
        Self {
            ledger,
            reserve_retry: RetryPolicy::default(),
        }
    }

    pub fn with_reserve_retry(mut self, policy: RetryPolicy) -> Self {
        self.reserve_retry = policy;
        self
    }

    pub fn ledger(&self) -> &Arc<StockLedger<S, P>> {
        &self.ledger
    }
}

impl<S: StockStore, P: EventPublisher> Clone for LedgerInventory<S, P> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            reserve_retry: self.reserve_retry,
        }
    }
}

#[async_trait]
impl<S: StockStore, P: EventPublisher> InventoryService for LedgerInventory<S, P> {
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<(), StepError> {
        retry_on_conflict(&self.reserve_retry, || {
            self.ledger.reserve(product_id, quantity)
        })
        .await?;
        Ok(())
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<(), StepError> {
        self.ledger.release(product_id, quantity).await?;
        Ok(())
    }
}
