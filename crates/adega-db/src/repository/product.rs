//! # Product Repository
//!
//! Database operations for catalog products and their legacy flat stock.
//!
//! ## Legacy Flat Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.stock_quantity                                                │
//! │                                                                         │
//! │  no active variants  → THE stock pool (units), sold and adjusted here  │
//! │  explicit variants   → mirror of total_stock_units, rewritten after    │
//! │                        every variant mutation for older readers        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions taking `&mut SqliteConnection` run inside a caller's
//! transaction; the repository methods use the pool directly.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use adega_core::validation::{validate_price_cents, validate_product_name};
use adega_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, category, price_cents, cost_price_cents, barcode, \
     package_barcode, minimum_stock, stock_quantity, package_units, package_price_cents, \
     has_package_tracking, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID, including inactive ones.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id).await
    }

    /// Finds an active product by its unit or package barcode.
    pub async fn find_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 AND (barcode = ?1 OR package_barcode = ?1) LIMIT 1",
            PRODUCT_COLUMNS
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(barcode.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists active products by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed active products");
        Ok(products)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        validate_product_name(&product.name)?;
        validate_price_cents(product.price_cents)?;

        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, price_cents, cost_price_cents, barcode,
                package_barcode, minimum_stock, stock_quantity, package_units,
                package_price_cents, has_package_tracking, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(&product.barcode)
        .bind(&product.package_barcode)
        .bind(product.minimum_stock)
        .bind(product.stock_quantity)
        .bind(product.package_units)
        .bind(product.package_price_cents)
        .bind(product.has_package_tracking)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-deletes a product.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }
}

// =============================================================================
// Transaction-scoped Operations
// =============================================================================

pub(crate) async fn fetch_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

/// No-op write on the product row. Inside a transaction this takes the
/// SQLite write lock before anything is read.
///
/// Returns false when the product does not exist.
pub(crate) async fn touch(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let result = sqlx::query("UPDATE products SET updated_at = updated_at WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Overwrites the legacy flat stock (mirror or adjustment result).
pub(crate) async fn set_legacy_stock(
    conn: &mut SqliteConnection,
    id: &str,
    stock_quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query("UPDATE products SET stock_quantity = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(stock_quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Decrements the flat pool only if it holds at least `units`.
///
/// Returns false (and changes nothing) when stock is short.
pub(crate) async fn decrement_legacy_stock(
    conn: &mut SqliteConnection,
    id: &str,
    units: i64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity - ?2, updated_at = ?3
        WHERE id = ?1 AND stock_quantity >= ?2
        "#,
    )
    .bind(id)
    .bind(units)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Records the package configuration on the product row.
pub(crate) async fn set_package_tracking(
    conn: &mut SqliteConnection,
    id: &str,
    enabled: bool,
    package_units: Option<i64>,
    package_price_cents: Option<i64>,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET has_package_tracking = ?2,
            package_units = COALESCE(?3, package_units),
            package_price_cents = COALESCE(?4, package_price_cents),
            updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(enabled)
    .bind(package_units)
    .bind(package_price_cents)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Drops the legacy package fields so no virtual package view is synthesized.
pub(crate) async fn clear_package_data(conn: &mut SqliteConnection, id: &str, now: DateTime<Utc>) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET has_package_tracking = 0, package_units = NULL, package_price_cents = NULL,
            updated_at = ?2
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use uuid::Uuid;

    /// A legacy product (no variants) ready to insert.
    pub(crate) fn new_product(name: &str, stock: i64, package_units: Option<i64>) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: Some("Cerveja".to_string()),
            price_cents: 500,
            cost_price_cents: Some(300),
            barcode: Some(format!("789{}", &Uuid::new_v4().simple().to_string()[..8])),
            package_barcode: None,
            minimum_stock: 6,
            stock_quantity: stock,
            package_units,
            package_price_cents: None,
            has_package_tracking: package_units.is_some(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Heineken Long Neck", 48, Some(6));
        db.products().insert(&product).await.unwrap();

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Heineken Long Neck");
        assert_eq!(loaded.stock_quantity, 48);
        assert_eq!(loaded.package_units, Some(6));
        assert!(loaded.has_package_tracking);

        let by_code = db
            .products()
            .find_by_barcode(product.barcode.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(by_code.map(|p| p.id), Some(product.id));
    }

    #[tokio::test]
    async fn test_rejects_blank_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("   ", 1, None);
        assert!(matches!(
            db.products().insert(&product).await,
            Err(DbError::Domain(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Vinho Tinto Seco", 10, None);
        db.products().insert(&product).await.unwrap();

        db.products().deactivate(&product.id).await.unwrap();
        assert!(db.products().list_active(10).await.unwrap().is_empty());
        assert!(matches!(
            db.products().deactivate("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_guarded_legacy_decrement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = new_product("Agua Mineral", 5, None);
        db.products().insert(&product).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!decrement_legacy_stock(&mut conn, &product.id, 6, Utc::now()).await.unwrap());
        assert!(decrement_legacy_stock(&mut conn, &product.id, 5, Utc::now()).await.unwrap());
        drop(conn);

        let loaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_quantity, 0);
    }
}
