//! Bounded retry of a read-modify-write that lost a version race.

use std::future::Future;
use std::time::Duration;

use crate::{InventoryError, Result};

/// How many times a conflicted operation is re-run, and how long to wait
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Base delay; the n-th retry waits `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// A policy that surfaces the first conflict.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(5))
    }
}

/// Runs `op`, re-running it from scratch while it fails with
/// [`InventoryError::Conflict`] and retries remain.
///
/// `op` must perform the full read-then-conditional-write each time; only
/// re-applying a delta computed from the stale read would lose updates.
/// Every other error is returned immediately.
pub async fn retry_on_conflict<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Err(InventoryError::Conflict {
                product_id,
                expected,
            }) if retries < policy.max_retries => {
                retries += 1;
                metrics::counter!("inventory_conflict_retries_total").increment(1);
                tracing::debug!(%product_id, %expected, retries, "retrying after version conflict");
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff * retries).await;
                }
            }
            other => return other,
        }
    }
}
