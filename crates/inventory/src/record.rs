use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Version counter of a stock record, used for optimistic concurrency control.
///
/// A record is created at version 1 and every successful mutation
/// increments it by exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version (1) of a freshly declared record.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::first()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Stock held for one product.
///
/// `quantity` is unsigned, so a negative stock level is unrepresentable;
/// writes that would underflow are rejected before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub quantity: u32,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// Creates a record at the first version.
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            version: Version::first(),
            updated_at: Utc::now(),
        }
    }

    /// Returns true if at least one unit is in stock.
    pub fn is_available(&self) -> bool {
        self.quantity > 0
    }

    /// Returns the record as it looks after a successful write of `quantity`.
    pub fn advanced(&self, quantity: u32) -> Self {
        Self {
            product_id: self.product_id.clone(),
            quantity,
            version: self.version.next(),
            updated_at: Utc::now(),
        }
    }
}
