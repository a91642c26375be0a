use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Courier, CourierFilter, Order};

/// Errors raised while reading couriers or orders from the backing store
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Invalid row in {table}: {reason}")]
    InvalidRow { table: &'static str, reason: String },
}

/// Read-only provider of the courier snapshot
///
/// Implementations return couriers in a stable order so nearest-match
/// tie-breaks are reproducible between runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourierSource: Send + Sync {
    async fn fetch_all(&self, filter: CourierFilter) -> Result<Vec<Courier>, RepositoryError>;
}

/// Read-only provider of pending orders
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Order>, RepositoryError>;
}

/// Reject a snapshot in which two rows share an identifier
pub fn ensure_unique_ids(
    table: &'static str,
    ids: impl IntoIterator<Item = i64>,
) -> Result<(), RepositoryError> {
    let mut seen = std::collections::HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(RepositoryError::InvalidRow {
                table,
                reason: format!("duplicate id {}", id),
            });
        }
    }
    Ok(())
}

/// Courier source over an in-memory snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticCourierSource {
    couriers: Vec<Courier>,
}

impl StaticCourierSource {
    pub fn new(couriers: Vec<Courier>) -> Self {
        Self { couriers }
    }
}

#[async_trait]
impl CourierSource for StaticCourierSource {
    async fn fetch_all(&self, filter: CourierFilter) -> Result<Vec<Courier>, RepositoryError> {
        Ok(self
            .couriers
            .iter()
            .filter(|c| filter.accepts(c))
            .cloned()
            .collect())
    }
}

/// Order source over an in-memory snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticOrderSource {
    orders: Vec<Order>,
}

impl StaticOrderSource {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl OrderSource for StaticOrderSource {
    async fn fetch_all(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.orders.clone())
    }
}
