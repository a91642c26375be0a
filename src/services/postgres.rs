use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;

use super::repository::{ensure_unique_ids, CourierSource, OrderSource, RepositoryError};
use crate::models::{Courier, CourierFilter, EligibilityPolicy, Order};

/// Errors that can occur while connecting to PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("Connection error: {0}")]
    ConnectError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

/// PostgreSQL connection pool shared by the courier and order repositories
#[derive(Clone)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        run_migrations: bool,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        let client = Self::new(
            url,
            max_connections.unwrap_or(5),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
        )
        .await?;

        if run_migrations {
            sqlx::migrate!("./migrations").run(&client.pool).await?;
            tracing::info!("Database migrations applied");
        }

        Ok(client)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Build the courier query, pushing the eligibility filter into SQL
pub fn courier_query(filter: CourierFilter) -> String {
    let predicate = match filter {
        CourierFilter::All | CourierFilter::Eligible(EligibilityPolicy::Any) => "",
        CourierFilter::Eligible(EligibilityPolicy::Free) => " WHERE active_package = FALSE",
        CourierFilter::Eligible(EligibilityPolicy::Flagged) => " WHERE active_package = TRUE",
    };

    format!(
        "SELECT id, latitude, longitude, active_package FROM couriers{} ORDER BY id",
        predicate
    )
}

const ORDER_QUERY: &str =
    "SELECT id, latitude, longitude, package_type FROM orders ORDER BY id";

fn courier_from_row(row: &PgRow) -> Result<Courier, sqlx::Error> {
    Ok(Courier {
        id: row.try_get("id")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        has_active_package: row.try_get("active_package")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    let package_type: Option<String> = row.try_get("package_type")?;
    Ok(Order {
        id: row.try_get("id")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        package_type: package_type.unwrap_or_default(),
    })
}

/// PostgreSQL implementation of CourierSource
#[derive(Clone)]
pub struct PostgresCourierRepository {
    client: PostgresClient,
}

impl PostgresCourierRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CourierSource for PostgresCourierRepository {
    async fn fetch_all(&self, filter: CourierFilter) -> Result<Vec<Courier>, RepositoryError> {
        let sql = courier_query(filter);
        let rows = sqlx::query(&sql).fetch_all(&self.client.pool).await?;

        let couriers = rows
            .iter()
            .map(courier_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        ensure_unique_ids("couriers", couriers.iter().map(|c| c.id))?;
        tracing::debug!("Fetched {} couriers ({:?})", couriers.len(), filter);

        Ok(couriers)
    }
}

/// PostgreSQL implementation of OrderSource
#[derive(Clone)]
pub struct PostgresOrderRepository {
    client: PostgresClient,
}

impl PostgresOrderRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrderSource for PostgresOrderRepository {
    async fn fetch_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(ORDER_QUERY).fetch_all(&self.client.pool).await?;

        let orders = rows
            .iter()
            .map(order_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        ensure_unique_ids("orders", orders.iter().map(|o| o.id))?;
        tracing::debug!("Fetched {} orders", orders.len());

        Ok(orders)
    }
}
