use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{InventoryError, ProductId, Result, StockRecord, Version, store::StockStore};

const RECORD_COLUMNS: &str = "product_id, stock, version, updated_at";

/// PostgreSQL-backed stock store.
///
/// Reservations rely on a single conditional `UPDATE ... WHERE version = $2`;
/// no row lock is taken between the caller's read and that write.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<StockRecord> {
        let product_id = ProductId::new(row.try_get::<String, _>("product_id")?);
        let stock: i64 = row.try_get("stock")?;
        let quantity = u32::try_from(stock).map_err(|_| InventoryError::OutOfRange {
            product_id: product_id.clone(),
            value: stock,
        })?;

        Ok(StockRecord {
            product_id,
            quantity,
            version: Version::new(row.try_get("version")?),
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn get(&self, product_id: &ProductId) -> Result<Option<StockRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_items WHERE product_id = $1"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn insert(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO inventory_items (product_id, stock, version)
            VALUES ($1, $2, 1)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return InventoryError::AlreadyExists(product_id.clone());
            }
            InventoryError::Database(e)
        })?;

        Self::row_to_record(row)
    }

    async fn compare_and_set(
        &self,
        product_id: &ProductId,
        expected: Version,
        quantity: u32,
    ) -> Result<Option<StockRecord>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE inventory_items
            SET stock = $3, version = version + 1, updated_at = NOW()
            WHERE product_id = $1 AND version = $2
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(product_id.as_str())
        .bind(expected.as_i64())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn upsert(&self, product_id: &ProductId, quantity: u32) -> Result<StockRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO inventory_items (product_id, stock, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (product_id) DO UPDATE
            SET stock = EXCLUDED.stock,
                version = inventory_items.version + 1,
                updated_at = NOW()
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_record(row)
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<StockRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_items ORDER BY product_id OFFSET $1 LIMIT $2"
        ))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
