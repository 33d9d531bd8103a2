//! # Sale Repository
//!
//! Sale headers and lines. Written only by the checkout service, inside the
//! same transaction that deducts the stock.
//!
//! ## Snapshot Pattern
//! Name and price are copied onto each `sale_items` row so history survives
//! catalog edits.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use adega_core::{Sale, SaleItem};

const SALE_COLUMNS: &str = "id, receipt_number, user_id, total_cents, notes, created_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, variant_id, variant_type, name_snapshot, \
     unit_price_cents, quantity, units_deducted, line_total_cents, created_at";

/// Repository for sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets all items for a sale, in line order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Number of recorded sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-scoped Operations
// =============================================================================

pub(crate) async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, receipt = %sale.receipt_number, "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (id, receipt_number, user_id, total_cents, notes, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.receipt_number)
    .bind(&sale.user_id)
    .bind(sale.total_cents)
    .bind(&sale.notes)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn update_total(conn: &mut SqliteConnection, sale_id: &str, total_cents: i64) -> DbResult<()> {
    sqlx::query("UPDATE sales SET total_cents = ?2 WHERE id = ?1")
        .bind(sale_id)
        .bind(total_cents)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, variant_id, variant_type, name_snapshot,
            unit_price_cents, quantity, units_deducted, line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.variant_id)
    .bind(item.variant_type)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.units_deducted)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Next receipt number for the day: `YYYYMMDD-NNNN`.
///
/// Must run while the transaction holds the write lock, otherwise two
/// sales could read the same count.
pub(crate) async fn next_receipt_number(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<String> {
    let date_part = now.format("%Y%m%d").to_string();
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE receipt_number LIKE ?1")
        .bind(format!("{}-%", date_part))
        .fetch_one(&mut *conn)
        .await?;

    Ok(format!("{}-{:04}", date_part, taken + 1))
}
