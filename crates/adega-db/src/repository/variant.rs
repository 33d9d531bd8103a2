//! # Variant Repository
//!
//! Rows of `product_variants`: the unit and package counters of a product.
//!
//! Stock columns are only written from inside a stock transaction (see
//! `service::stock_tx`); this repository's pool methods are reads and
//! catalog setup.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use adega_core::validation::validate_units_in_package;
use adega_core::{ProductVariant, ValidationError, VariantType};

const VARIANT_COLUMNS: &str = "id, product_id, variant_type, stock_quantity, units_in_package, \
     price_cents, cost_price_cents, barcode, minimum_stock, is_active, created_at, updated_at";

/// Repository for product variant operations.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    /// Creates a new VariantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Active variants of a product (unit first).
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let mut conn = self.pool.acquire().await?;
        fetch_active_for_product(&mut conn, product_id).await
    }

    /// Gets a variant by ID, active or not.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let sql = format!("SELECT {} FROM product_variants WHERE id = ?1", VARIANT_COLUMNS);
        let variant = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(variant)
    }

    /// Finds the active variant carrying `barcode`.
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<ProductVariant>> {
        let sql = format!(
            "SELECT {} FROM product_variants WHERE is_active = 1 AND barcode = ?1 LIMIT 1",
            VARIANT_COLUMNS
        );
        let variant = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(barcode.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(variant)
    }

    /// Inserts a variant.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the product already has an active variant of
    ///   this type
    pub async fn insert(&self, variant: &ProductVariant) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_variant(&mut conn, variant).await
    }

    /// Updates the minimum stock threshold of a variant.
    pub async fn set_minimum_stock(&self, id: &str, minimum_stock: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE product_variants SET minimum_stock = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(minimum_stock.max(0))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        Ok(())
    }

    /// Active variants at or below their minimum stock.
    pub async fn low_stock(&self, limit: u32) -> DbResult<Vec<ProductVariant>> {
        let sql = format!(
            r#"
            SELECT {} FROM product_variants
            WHERE is_active = 1 AND minimum_stock > 0 AND stock_quantity <= minimum_stock
            ORDER BY stock_quantity ASC
            LIMIT ?1
            "#,
            VARIANT_COLUMNS
        );
        let variants = sqlx::query_as::<_, ProductVariant>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(variants)
    }
}

// =============================================================================
// Transaction-scoped Operations
// =============================================================================

pub(crate) async fn fetch_active_for_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<ProductVariant>> {
    let sql = format!(
        "SELECT {} FROM product_variants WHERE product_id = ?1 AND is_active = 1 ORDER BY variant_type DESC",
        VARIANT_COLUMNS
    );
    let variants = sqlx::query_as::<_, ProductVariant>(&sql)
        .bind(product_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(variants)
}

pub(crate) async fn insert_variant(conn: &mut SqliteConnection, variant: &ProductVariant) -> DbResult<()> {
    match (variant.variant_type, variant.units_in_package) {
        (VariantType::Package, Some(units)) => validate_units_in_package(units)?,
        (VariantType::Package, None) => {
            return Err(ValidationError::Required {
                field: "units_in_package".to_string(),
            }
            .into())
        }
        (VariantType::Unit, Some(_)) => {
            return Err(ValidationError::InvalidFormat {
                field: "units_in_package".to_string(),
                reason: "unit variants have no package size".to_string(),
            }
            .into())
        }
        (VariantType::Unit, None) => {}
    }

    debug!(
        id = %variant.id,
        product_id = %variant.product_id,
        variant_type = %variant.variant_type,
        "Inserting variant"
    );

    sqlx::query(
        r#"
        INSERT INTO product_variants (
            id, product_id, variant_type, stock_quantity, units_in_package,
            price_cents, cost_price_cents, barcode, minimum_stock, is_active,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&variant.id)
    .bind(&variant.product_id)
    .bind(variant.variant_type)
    .bind(variant.stock_quantity)
    .bind(variant.units_in_package)
    .bind(variant.price_cents)
    .bind(variant.cost_price_cents)
    .bind(&variant.barcode)
    .bind(variant.minimum_stock)
    .bind(variant.is_active)
    .bind(variant.created_at)
    .bind(variant.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Sets a variant's stock, guarded by the value the caller planned from.
///
/// Returns false when the row changed underneath (or is inactive).
pub(crate) async fn set_stock(
    conn: &mut SqliteConnection,
    id: &str,
    expected: i64,
    new_stock: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE product_variants
        SET stock_quantity = ?3, updated_at = ?4
        WHERE id = ?1 AND is_active = 1 AND stock_quantity = ?2
        "#,
    )
    .bind(id)
    .bind(expected)
    .bind(new_stock)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Decrements only if the variant holds at least `quantity`.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    id: &str,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE product_variants
        SET stock_quantity = stock_quantity - ?2, updated_at = ?3
        WHERE id = ?1 AND is_active = 1 AND stock_quantity >= ?2
        "#,
    )
    .bind(id)
    .bind(quantity)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-deactivates every active variant of a product.
pub(crate) async fn deactivate_for_product(
    conn: &mut SqliteConnection,
    product_id: &str,
    now: DateTime<Utc>,
) -> DbResult<u64> {
    let result = sqlx::query(
        "UPDATE product_variants SET is_active = 0, updated_at = ?2 WHERE product_id = ?1 AND is_active = 1",
    )
    .bind(product_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Builds a new variant row.
pub(crate) fn new_variant(
    product_id: &str,
    variant_type: VariantType,
    stock_quantity: i64,
    units_in_package: Option<i64>,
    price_cents: i64,
    now: DateTime<Utc>,
) -> ProductVariant {
    ProductVariant {
        id: uuid::Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        variant_type,
        stock_quantity,
        units_in_package,
        price_cents,
        cost_price_cents: None,
        barcode: None,
        minimum_stock: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::tests::new_product;
    use adega_core::CoreError;

    #[tokio::test]
    async fn test_one_active_variant_per_type() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Skol Lata", 0, Some(12));
        db.products().insert(&product).await.unwrap();

        let now = Utc::now();
        let first = new_variant(&product.id, VariantType::Unit, 10, None, 350, now);
        db.variants().insert(&first).await.unwrap();

        let second = new_variant(&product.id, VariantType::Unit, 3, None, 350, now);
        assert!(matches!(
            db.variants().insert(&second).await,
            Err(DbError::UniqueViolation { .. })
        ));

        // A retired row does not count
        let mut conn = db.pool().acquire().await.unwrap();
        deactivate_for_product(&mut conn, &product.id, now).await.unwrap();
        drop(conn);
        db.variants().insert(&second).await.unwrap();

        let active = db.variants().list_for_product(&product.id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }

    #[tokio::test]
    async fn test_stock_cannot_go_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Brahma Lata", 0, Some(12));
        db.products().insert(&product).await.unwrap();

        let variant = new_variant(&product.id, VariantType::Package, 2, Some(12), 3600, Utc::now());
        db.variants().insert(&variant).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!decrement_stock(&mut conn, &variant.id, 3, Utc::now()).await.unwrap());
        assert!(decrement_stock(&mut conn, &variant.id, 2, Utc::now()).await.unwrap());
        assert!(!set_stock(&mut conn, &variant.id, 2, 5, Utc::now()).await.unwrap());
        drop(conn);

        let loaded = db.variants().get_by_id(&variant.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 0);
    }

    #[tokio::test]
    async fn test_find_by_barcode_skips_retired_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Stella Artois Long Neck", 0, Some(24));
        db.products().insert(&product).await.unwrap();

        let now = Utc::now();
        let mut package = new_variant(&product.id, VariantType::Package, 4, Some(24), 14900, now);
        package.barcode = Some("17891149108718".to_string());
        db.variants().insert(&package).await.unwrap();

        let found = db.variants().find_by_barcode(" 17891149108718 ").await.unwrap().unwrap();
        assert_eq!(found.id, package.id);
        assert_eq!(found.units_per_item(), 24);

        let mut conn = db.pool().acquire().await.unwrap();
        deactivate_for_product(&mut conn, &product.id, now).await.unwrap();
        drop(conn);
        assert!(db.variants().find_by_barcode("17891149108718").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_package_requires_size() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Chopp", 0, None);
        db.products().insert(&product).await.unwrap();

        let broken = new_variant(&product.id, VariantType::Package, 1, None, 1000, Utc::now());
        assert!(matches!(
            db.variants().insert(&broken).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let zero = new_variant(&product.id, VariantType::Package, 1, Some(0), 1000, Utc::now());
        assert!(db.variants().insert(&zero).await.is_err());

        // The schema refuses a sizeless package row on its own
        let raw = sqlx::query(
            "INSERT INTO product_variants (id, product_id, variant_type, stock_quantity, created_at, updated_at)
             VALUES ('raw-package', ?1, 'package', 3, '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
        )
        .bind(&product.id)
        .execute(db.pool())
        .await;
        assert!(raw.is_err());

        let unit = new_variant(&product.id, VariantType::Unit, 4, None, 1000, Utc::now());
        db.variants().insert(&unit).await.unwrap();
        assert_eq!(db.inventory().get_product_total_units(&product.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_low_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Guarana", 0, None);
        db.products().insert(&product).await.unwrap();

        let mut variant = new_variant(&product.id, VariantType::Unit, 2, None, 400, Utc::now());
        variant.minimum_stock = 5;
        db.variants().insert(&variant).await.unwrap();

        let low = db.variants().low_stock(10).await.unwrap();
        assert_eq!(low.len(), 1);

        db.variants().set_minimum_stock(&variant.id, 1).await.unwrap();
        assert!(db.variants().low_stock(10).await.unwrap().is_empty());
    }
}
