//! Route handlers.

pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;

use serde::Deserialize;

/// Default page size for the admin listings.
pub const DEFAULT_LIMIT: usize = 100;

/// `?skip=&limit=` pagination shared by the admin listings.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}
