//! # Movement Repository
//!
//! The `inventory_movements` ledger: one row per stock-affecting event.
//! Reporting reads it; the stock transaction is the only writer.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use adega_core::{InventoryMovement, DEFAULT_HISTORY_LIMIT};

const MOVEMENT_COLUMNS: &str = "id, product_id, variant_id, variant_type, movement_type, \
     quantity_change, previous_stock, new_stock, reason, user_id, sale_id, conversion_id, created_at";

/// Repository for movement ledger reads.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Movements of a product, newest first.
    pub async fn history(&self, product_id: &str, limit: Option<u32>) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            r#"
            SELECT {} FROM inventory_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(product_id)
            .bind(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Movements written by one sale, in write order.
    pub async fn for_sale(&self, sale_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            "SELECT {} FROM inventory_movements WHERE sale_id = ?1 ORDER BY rowid",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

pub(crate) async fn insert(conn: &mut SqliteConnection, movement: &InventoryMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_movements (
            id, product_id, variant_id, variant_type, movement_type,
            quantity_change, previous_stock, new_stock, reason, user_id,
            sale_id, conversion_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(&movement.variant_id)
    .bind(movement.variant_type)
    .bind(movement.movement_type)
    .bind(movement.quantity_change)
    .bind(movement.previous_stock)
    .bind(movement.new_stock)
    .bind(&movement.reason)
    .bind(&movement.user_id)
    .bind(&movement.sale_id)
    .bind(&movement.conversion_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
