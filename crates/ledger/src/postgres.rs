use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::{
    LedgerError, MovementId, MovementQuery, MovementType, NewMovement, NewProduct, Product,
    ProductId, Result, StockMovement, UserId,
    store::{InventoryStore, StockTransaction},
};

const STOCK_CONSTRAINT: &str = "products_stock_non_negative";

const PRODUCT_COLUMNS: &str = "id, name, category_id, stock, version, created_at";
const MOVEMENT_COLUMNS: &str = "id, product_id, user_id, movement_type, quantity, note, created_at";

/// PostgreSQL-backed inventory store implementation.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PostgresInventoryStore {
    /// Creates a new PostgreSQL inventory store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Connects a new pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Bounds how long a transaction waits for a product row lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("inventory migrations applied");
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            category_id: row.try_get("category_id")?,
            stock: row.try_get("stock")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_movement(row: PgRow) -> Result<StockMovement> {
        let movement_type: String = row.try_get("movement_type")?;
        let movement_type = movement_type
            .parse::<MovementType>()
            .map_err(|e| LedgerError::InvalidRow(e.to_string()))?;

        Ok(StockMovement {
            id: MovementId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            movement_type,
            quantity: row.try_get("quantity")?,
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Maps a CHECK violation on the stock column to `NegativeStock`.
fn stock_write_error(err: sqlx::Error, product_id: ProductId, stock: i64) -> LedgerError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.constraint() == Some(STOCK_CONSTRAINT)
    {
        return LedgerError::NegativeStock { product_id, stock };
    }
    LedgerError::Database(err)
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn begin(&self) -> Result<Box<dyn StockTransaction>> {
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.lock_timeout {
            // SET does not accept bind parameters; the value is an integer we format ourselves.
            sqlx::query(&format!(
                "SET LOCAL lock_timeout = '{}ms'",
                timeout.as_millis()
            ))
            .execute(&mut *tx)
            .await?;
        }

        Ok(Box::new(PostgresStockTransaction {
            tx,
            locked: HashSet::new(),
        }))
    }

    async fn register_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, category_id, stock)
            VALUES ($1, $2, $3)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(product.category_id)
        .bind(product.opening_stock)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| stock_write_error(e, ProductId::new(0), product.opening_stock))?;

        Self::row_to_product(row)
    }

    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn find_movement(&self, movement_id: MovementId) -> Result<Option<StockMovement>> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = $1"
        ))
        .bind(movement_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_movement).transpose()
    }

    async fn list_movements(&self) -> Result<Vec<StockMovement>> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_movement).collect()
    }

    async fn delete_movement(&self, movement_id: MovementId) -> Result<Option<StockMovement>> {
        let row = sqlx::query(&format!(
            "DELETE FROM stock_movements WHERE id = $1 RETURNING {MOVEMENT_COLUMNS}"
        ))
        .bind(movement_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_movement).transpose()
    }

    async fn scan_movements(&self, query: &MovementQuery) -> Result<Vec<StockMovement>> {
        let mut sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.month.is_some() {
            sql.push_str(&format!(
                " AND created_at >= ${} AND created_at < ${}",
                param_count + 1,
                param_count + 2
            ));
            param_count += 2;
        }
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.product_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND product_id = ${param_count}"));
        }
        if query.movement_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND movement_type = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        // Bind in the same order the placeholders were generated
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(month) = query.month {
            sqlx_query = sqlx_query.bind(month.start()).bind(month.end());
        }
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_i64());
        }
        if let Some(product_id) = query.product_id {
            sqlx_query = sqlx_query.bind(product_id.as_i64());
        }
        if let Some(movement_type) = query.movement_type {
            sqlx_query = sqlx_query.bind(movement_type.as_str());
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_movement).collect()
    }
}

/// Transaction over a [`PostgresInventoryStore`].
///
/// Row locks are taken with `SELECT ... FOR UPDATE` and released by Postgres
/// on commit or rollback. Dropping the transaction rolls it back.
pub struct PostgresStockTransaction {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<ProductId>,
}

#[async_trait]
impl StockTransaction for PostgresStockTransaction {
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => {
                tracing::debug!(%product_id, "product row locked");
                self.locked.insert(product_id);
                Ok(Some(PostgresInventoryStore::row_to_product(row)?))
            }
            None => Ok(None),
        }
    }

    async fn write_stock(&mut self, product_id: ProductId, stock: i64) -> Result<()> {
        if !self.locked.contains(&product_id) {
            return Err(LedgerError::LockNotHeld(product_id));
        }
        if stock < 0 {
            return Err(LedgerError::NegativeStock { product_id, stock });
        }

        sqlx::query("UPDATE products SET stock = $2, version = version + 1 WHERE id = $1")
            .bind(product_id.as_i64())
            .bind(stock)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| stock_write_error(e, product_id, stock))?;

        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<StockMovement> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO stock_movements (product_id, user_id, movement_type, quantity, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(movement.product_id.as_i64())
        .bind(movement.user_id.as_i64())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(&movement.note)
        .fetch_one(&mut *self.tx)
        .await?;

        PostgresInventoryStore::row_to_movement(row)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
