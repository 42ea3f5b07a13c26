//! SQLite-backed sync store using sqlx.

use {
    async_trait::async_trait,
    sqlx::{
        Row, SqlitePool,
        sqlite::{SqlitePoolOptions, SqliteRow},
    },
};

use crate::{
    Error, Result,
    error::Context,
    reconcile::SyncTally,
    store::SyncStore,
    types::{LocalProduct, NotificationLogEntry, RunClose, StoreStats, SyncRun},
};

const RUN_COLUMNS: &str =
    "id, operation, status, item_count, duration_ms, error_message, metadata, created_at_ms";

const PRODUCT_COLUMNS: &str = "external_id, sku, title, description, weight, quantity, price, \
     vendor, product_type, image_url, tags, status, last_synced_at_ms, created_at_ms";

/// SQLite-backed persistence for the run ledger, product mirror and
/// notification log.
pub struct SqliteSyncStore {
    pool: SqlitePool,
}

impl SqliteSyncStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Every connection to `:memory:` is a separate database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to SQLite")?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }
}

fn run_from_row(row: &SqliteRow) -> Result<SyncRun> {
    let operation: String = row.get("operation");
    let status: String = row.get("status");
    let metadata = row
        .get::<Option<String>, _>("metadata")
        .map(|m| serde_json::from_str::<SyncTally>(&m))
        .transpose()?;
    Ok(SyncRun {
        id: row.get("id"),
        operation: operation.parse()?,
        status: status.parse()?,
        item_count: row.get::<i64, _>("item_count") as u64,
        duration_ms: row.get::<Option<i64>, _>("duration_ms").map(|v| v as u64),
        error_message: row.get("error_message"),
        metadata,
        created_at_ms: row.get::<i64, _>("created_at_ms") as u64,
    })
}

fn product_from_row(row: &SqliteRow) -> LocalProduct {
    LocalProduct {
        external_id: row.get("external_id"),
        sku: row.get("sku"),
        title: row.get("title"),
        description: row.get("description"),
        weight: row.get("weight"),
        quantity: row.get("quantity"),
        price: row.get("price"),
        vendor: row.get("vendor"),
        product_type: row.get("product_type"),
        image_url: row.get("image_url"),
        tags: row.get("tags"),
        status: row.get("status"),
        last_synced_at_ms: row.get::<i64, _>("last_synced_at_ms") as u64,
        created_at_ms: row.get::<i64, _>("created_at_ms") as u64,
    }
}

fn notification_from_row(row: &SqliteRow) -> Result<NotificationLogEntry> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    Ok(NotificationLogEntry {
        id: row.get("id"),
        kind: kind.parse()?,
        subject: row.get("subject"),
        body: row.get("body"),
        sent: status == "sent",
        error_message: row.get("error_message"),
        created_at_ms: row.get::<i64, _>("created_at_ms") as u64,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    async fn insert_run(&self, run: &SyncRun) -> Result<()> {
        let metadata = run.metadata.map(|m| serde_json::to_string(&m)).transpose()?;
        sqlx::query(
            "INSERT INTO sync_runs (id, operation, status, item_count, duration_ms, error_message, metadata, created_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(run.operation.as_str())
        .bind(run.status.as_str())
        .bind(run.item_count as i64)
        .bind(run.duration_ms.map(|v| v as i64))
        .bind(&run.error_message)
        .bind(metadata)
        .bind(run.created_at_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish_run(&self, id: &str, close: &RunClose) -> Result<SyncRun> {
        let mut run = self
            .get_run(id)
            .await?
            .ok_or_else(|| Error::run_not_found(id))?;
        run.close(close)?;

        let metadata = run.metadata.map(|m| serde_json::to_string(&m)).transpose()?;
        let result = sqlx::query(
            "UPDATE sync_runs
             SET status = ?, item_count = ?, duration_ms = ?, error_message = ?, metadata = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(run.status.as_str())
        .bind(run.item_count as i64)
        .bind(run.duration_ms.map(|v| v as i64))
        .bind(&run.error_message)
        .bind(metadata)
        .bind(id)
        .execute(&self.pool)
        .await?;

        // Lost the race against another close.
        if result.rows_affected() == 0 {
            return Err(Error::RunNotPending {
                run_id: id.to_string(),
            });
        }
        Ok(run)
    }

    async fn get_run(&self, id: &str) -> Result<Option<SyncRun>> {
        let row = sqlx::query(&format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM sync_runs
             ORDER BY created_at_ms DESC, rowid DESC
             LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(run_from_row).collect()
    }

    async fn delete_runs_before(&self, cutoff_ms: u64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_runs WHERE created_at_ms < ?")
            .bind(cutoff_ms as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_product(&self, external_id: &str) -> Result<Option<LocalProduct>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(product_from_row))
    }

    async fn insert_product(&self, product: &LocalProduct) -> Result<()> {
        let result = sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&product.external_id)
        .bind(&product.sku)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.weight)
        .bind(product.quantity)
        .bind(product.price)
        .bind(&product.vendor)
        .bind(&product.product_type)
        .bind(&product.image_url)
        .bind(&product.tags)
        .bind(&product.status)
        .bind(product.last_synced_at_ms as i64)
        .bind(product.created_at_ms as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::ProductExists {
                external_id: product.external_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_product(&self, product: &LocalProduct) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products
             SET sku = ?, title = ?, description = ?, weight = ?, quantity = ?, price = ?,
                 vendor = ?, product_type = ?, image_url = ?, tags = ?, status = ?,
                 last_synced_at_ms = ?
             WHERE external_id = ?",
        )
        .bind(&product.sku)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.weight)
        .bind(product.quantity)
        .bind(product.price)
        .bind(&product.vendor)
        .bind(&product.product_type)
        .bind(&product.image_url)
        .bind(&product.tags)
        .bind(&product.status)
        .bind(product.last_synced_at_ms as i64)
        .bind(&product.external_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::ProductNotFound {
                external_id: product.external_id.clone(),
            });
        }
        Ok(())
    }

    async fn low_stock_products(&self, threshold: i64, limit: usize) -> Result<Vec<LocalProduct>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE quantity <= ?
             ORDER BY quantity ASC, external_id ASC
             LIMIT ?"
        ))
        .bind(threshold)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn stats(&self, low_stock_threshold: i64) -> Result<StoreStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN quantity <= ? THEN 1 ELSE 0 END), 0) AS low
             FROM products",
        )
        .bind(low_stock_threshold)
        .fetch_one(&self.pool)
        .await?;
        let last_run = self.recent_runs(1).await?.into_iter().next();
        Ok(StoreStats {
            total_products: row.get::<i64, _>("total") as u64,
            low_stock_count: row.get::<i64, _>("low") as u64,
            last_run,
        })
    }

    async fn append_notification(&self, entry: &NotificationLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO notification_log (id, kind, subject, body, status, error_message, created_at_ms)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(entry.kind.as_str())
        .bind(&entry.subject)
        .bind(&entry.body)
        .bind(if entry.sent { "sent" } else { "failed" })
        .bind(&entry.error_message)
        .bind(entry.created_at_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_notifications(&self, limit: usize) -> Result<Vec<NotificationLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, kind, subject, body, status, error_message, created_at_ms
             FROM notification_log
             ORDER BY created_at_ms DESC, rowid DESC
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn delete_notifications_before(&self, cutoff_ms: u64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notification_log WHERE created_at_ms < ?")
            .bind(cutoff_ms as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
