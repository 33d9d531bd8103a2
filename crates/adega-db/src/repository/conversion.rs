//! # Conversion Log Repository
//!
//! Read access to `inventory_conversion_log` plus the single append used by
//! the stock transaction. There is no update or delete: the table rejects
//! both with triggers.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use adega_core::{InventoryConversionLog, DEFAULT_HISTORY_LIMIT};

const LOG_COLUMNS: &str = "id, product_id, conversion_type, packages_converted, units_converted, \
     units_per_package, unit_stock_before, unit_stock_after, package_stock_before, \
     package_stock_after, user_id, sale_id, reason, created_at";

/// Repository for the conversion audit log.
#[derive(Debug, Clone)]
pub struct ConversionLogRepository {
    pool: SqlitePool,
}

impl ConversionLogRepository {
    /// Creates a new ConversionLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ConversionLogRepository { pool }
    }

    /// Conversions of a product, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`].
    pub async fn history(
        &self,
        product_id: &str,
        limit: Option<u32>,
    ) -> DbResult<Vec<InventoryConversionLog>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        debug!(product_id = %product_id, limit, "Loading conversion history");

        let sql = format!(
            r#"
            SELECT {} FROM inventory_conversion_log
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
            LOG_COLUMNS
        );
        let rows = sqlx::query_as::<_, InventoryConversionLog>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Conversions triggered by a sale.
    pub async fn for_sale(&self, sale_id: &str) -> DbResult<Vec<InventoryConversionLog>> {
        let sql = format!(
            "SELECT {} FROM inventory_conversion_log WHERE sale_id = ?1 ORDER BY rowid",
            LOG_COLUMNS
        );
        let rows = sqlx::query_as::<_, InventoryConversionLog>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Number of conversions recorded for a product.
    pub async fn count_for_product(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_conversion_log WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

/// Appends one log row inside the caller's transaction.
pub(crate) async fn append(conn: &mut SqliteConnection, log: &InventoryConversionLog) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_conversion_log (
            id, product_id, conversion_type, packages_converted, units_converted,
            units_per_package, unit_stock_before, unit_stock_after,
            package_stock_before, package_stock_after, user_id, sale_id, reason,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&log.id)
    .bind(&log.product_id)
    .bind(log.conversion_type)
    .bind(log.packages_converted)
    .bind(log.units_converted)
    .bind(log.units_per_package)
    .bind(log.unit_stock_before)
    .bind(log.unit_stock_after)
    .bind(log.package_stock_before)
    .bind(log.package_stock_after)
    .bind(&log.user_id)
    .bind(&log.sale_id)
    .bind(&log.reason)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
