//! # Checkout Service
//!
//! Records a sale and moves its stock in one transaction.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_sale(NewSale)                                                   │
//! │    │                                                                    │
//! │    ├── lock every product on the sale                                  │
//! │    ├── next receipt number, insert sale header                         │
//! │    │                                                                    │
//! │    ├── for each line:                                                  │
//! │    │     check availability (under the lock)                           │
//! │    │     open packages if the unit counter is short (linked to sale)   │
//! │    │     guarded decrement + `sale` ledger row                         │
//! │    │     insert sale item with the variant's price snapshot            │
//! │    │                                                                    │
//! │    ├── write the sale total                                            │
//! │    └── COMMIT                                                          │
//! │                                                                         │
//! │  Any failing line drops the transaction: no sale, no stock change,     │
//! │  no orphan conversion.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is deducted here, explicitly. Nothing reacts to `sale_items`
//! inserts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use adega_core::validation::normalize_reason;
use adega_core::{
    InventoryConversionLog, Money, NewSale, Sale, SaleItem, SynthesisPolicy, ValidationError,
};

use crate::error::DbResult;
use crate::repository::sale as sale_repo;
use crate::service::stock_tx::{StockAudit, StockTransaction};

/// A committed sale with everything it wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    /// Packages opened to fulfil unit lines.
    pub conversions: Vec<InventoryConversionLog>,
}

impl SaleReceipt {
    pub fn total(&self) -> Money {
        Money::from_cents(self.sale.total_cents)
    }
}

/// Sale recording over a connection pool.
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    policy: SynthesisPolicy,
}

impl CheckoutService {
    /// Creates a new CheckoutService.
    pub fn new(pool: SqlitePool, policy: SynthesisPolicy) -> Self {
        CheckoutService { pool, policy }
    }

    /// Records a multi-line sale atomically.
    ///
    /// ## Errors
    /// - `CoreError::InsufficientStock` for the first line that cannot be
    ///   fulfilled; nothing is written
    /// - `DbError::StorageUnavailable` when the write lock could not be taken
    ///   in time; retry the whole sale
    pub async fn record_sale(&self, request: NewSale) -> DbResult<SaleReceipt> {
        if request.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }
        if request.user_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "user_id".to_string(),
            }
            .into());
        }
        let notes = normalize_reason(request.notes.as_deref())?;

        let mut tx = StockTransaction::begin(&self.pool, self.policy).await?;

        let mut product_ids: Vec<&str> = request.lines.iter().map(|l| l.product_id.as_str()).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        for product_id in product_ids {
            tx.lock_product(product_id).await?;
        }

        let now = Utc::now();
        let mut sale = Sale {
            id: Uuid::new_v4().to_string(),
            receipt_number: sale_repo::next_receipt_number(tx.conn(), now).await?,
            user_id: request.user_id.clone(),
            total_cents: 0,
            notes,
            created_at: now,
        };
        // Header first: conversion and ledger rows reference it.
        sale_repo::insert_sale(tx.conn(), &sale).await?;

        let audit = StockAudit::by(request.user_id.as_str()).for_sale(sale.id.as_str());
        let mut items = Vec::with_capacity(request.lines.len());
        let mut conversions = Vec::new();
        let mut total = Money::zero();

        for (index, line) in request.lines.iter().enumerate() {
            let fulfilled = tx
                .sell_line(&line.product_id, line.variant_type, line.quantity, &audit)
                .await
                .inspect_err(|err| {
                    warn!(
                        line = index,
                        product_id = %line.product_id,
                        variant_type = %line.variant_type,
                        quantity = line.quantity,
                        error = %err,
                        "Sale line rejected; rolling back sale"
                    )
                })?;

            let line_total = fulfilled.variant.price().multiply_quantity(line.quantity);
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                variant_id: fulfilled.decrement.variant_id.clone(),
                variant_type: line.variant_type,
                name_snapshot: fulfilled.product_name,
                unit_price_cents: fulfilled.variant.price_cents,
                quantity: line.quantity,
                units_deducted: fulfilled.decrement.units_deducted,
                line_total_cents: line_total.cents(),
                created_at: now,
            };
            sale_repo::insert_item(tx.conn(), &item).await?;

            total += line_total;
            items.push(item);
            conversions.extend(fulfilled.conversion);
        }

        sale.total_cents = total.cents();
        sale_repo::update_total(tx.conn(), &sale.id, sale.total_cents).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            lines = items.len(),
            conversions = conversions.len(),
            total = %total,
            "Sale recorded"
        );

        Ok(SaleReceipt {
            sale,
            items,
            conversions,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::service::stock_tx::tests::{seed_explicit, seed_legacy};
    use adega_core::{CoreError, MovementType, SaleLineRequest, VariantType};
    use std::time::Duration;

    fn line(product_id: &str, variant_type: VariantType, quantity: i64) -> SaleLineRequest {
        SaleLineRequest {
            product_id: product_id.to_string(),
            variant_type,
            quantity,
        }
    }

    fn sale(lines: Vec<SaleLineRequest>) -> NewSale {
        NewSale {
            user_id: "cashier-1".to_string(),
            notes: None,
            lines,
        }
    }

    #[tokio::test]
    async fn test_unit_sale_with_conversion() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product_id, unit_id, package_id) = seed_explicit(&db, 5, 2, 6).await;

        let receipt = db
            .checkout()
            .record_sale(sale(vec![line(&product_id, VariantType::Unit, 10)]))
            .await
            .unwrap();

        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].units_deducted, 10);
        assert_eq!(receipt.items[0].variant_id.as_deref(), Some(unit_id.as_str()));
        assert_eq!(receipt.sale.total_cents, 5000);
        assert_eq!(receipt.conversions.len(), 1);
        assert_eq!(receipt.conversions[0].sale_id.as_deref(), Some(receipt.sale.id.as_str()));

        let unit = db.variants().get_by_id(&unit_id).await.unwrap().unwrap();
        let package = db.variants().get_by_id(&package_id).await.unwrap().unwrap();
        assert_eq!(unit.stock_quantity, 1);
        assert_eq!(package.stock_quantity, 1);

        let movements = db.movements().for_sale(&receipt.sale.id).await.unwrap();
        assert_eq!(movements.len(), 3);
        assert_eq!(movements[2].movement_type, MovementType::Sale);
        assert_eq!(movements[2].quantity_change, -10);

        let stored = db.sales().get_items(&receipt.sale.id).await.unwrap();
        assert_eq!(stored, receipt.items);

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["conversions"][0]["conversion_type"], "package_to_units");
        assert_eq!(json["items"][0]["variant_type"], "unit");
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back_whole_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (beer, beer_unit, beer_package) = seed_explicit(&db, 5, 2, 6).await;
        let wine = seed_legacy(&db, 3, None).await;

        let err = db
            .checkout()
            .record_sale(sale(vec![
                line(&beer, VariantType::Unit, 10),
                line(&wine, VariantType::Unit, 4),
            ]))
            .await
            .unwrap_err();
        assert!(err.is_stock_shortage());
        assert!(!err.is_retryable());

        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(db.conversions().count_for_product(&beer).await.unwrap(), 0);
        assert_eq!(
            db.variants().get_by_id(&beer_unit).await.unwrap().unwrap().stock_quantity,
            5
        );
        assert_eq!(
            db.variants().get_by_id(&beer_package).await.unwrap().unwrap().stock_quantity,
            2
        );
        assert_eq!(db.products().get_by_id(&wine).await.unwrap().unwrap().stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_package_sale_from_legacy_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product_id = seed_legacy(&db, 20, Some(6)).await;

        let receipt = db
            .checkout()
            .record_sale(sale(vec![line(&product_id, VariantType::Package, 2)]))
            .await
            .unwrap();

        let item = &receipt.items[0];
        assert_eq!(item.variant_id, None);
        assert_eq!(item.units_deducted, 12);
        // 500 × 6 − 10%
        assert_eq!(item.unit_price_cents, 2700);
        assert_eq!(receipt.sale.total_cents, 5400);
        assert!(receipt.conversions.is_empty());

        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 8);
    }

    #[tokio::test]
    async fn test_package_shortfall_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product_id, _, _) = seed_explicit(&db, 5, 2, 6).await;

        let err = db
            .checkout()
            .record_sale(sale(vec![line(&product_id, VariantType::Package, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock {
                variant_type: VariantType::Package,
                available: 2,
                requested: 3,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_receipt_numbers_are_sequential() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (product_id, _, _) = seed_explicit(&db, 10, 0, 6).await;
        let checkout = db.checkout();

        let first = checkout
            .record_sale(sale(vec![line(&product_id, VariantType::Unit, 1)]))
            .await
            .unwrap();
        let second = checkout
            .record_sale(sale(vec![line(&product_id, VariantType::Unit, 1)]))
            .await
            .unwrap();

        assert!(first.sale.receipt_number.ends_with("-0001"));
        assert!(second.sale.receipt_number.ends_with("-0002"));
    }

    #[tokio::test]
    async fn test_rejects_empty_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(matches!(
            db.checkout().record_sale(sale(vec![])).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_never_oversell() {
        let path = std::env::temp_dir().join(format!("adega-oversell-{}.db", Uuid::new_v4()));
        let config = DbConfig::new(&path)
            .max_connections(8)
            .busy_timeout(Duration::from_secs(15));
        let db = Database::new(config).await.unwrap();

        // 2 loose + 3 × 6 = 20 units
        let (product_id, _, _) = seed_explicit(&db, 2, 3, 6).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let checkout = db.checkout();
            let request = sale(vec![line(&product_id, VariantType::Unit, 3)]);
            handles.push(tokio::spawn(async move { checkout.record_sale(request).await }));
        }

        let mut sold = 0;
        let mut short = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(receipt) => sold += receipt.items[0].units_deducted,
                Err(err) => {
                    assert!(err.is_stock_shortage(), "unexpected error: {err}");
                    short += 1;
                }
            }
        }

        // Writers queue on the lock well within the busy timeout, so every
        // sale either lands or sees the real shortage.
        assert_eq!(sold, 18);
        assert_eq!(short, 4);
        let remaining = db.inventory().get_product_total_units(&product_id).await.unwrap();
        assert_eq!(remaining, 2);
        assert_eq!(db.sales().count().await.unwrap(), 6);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lock_timeout_is_retryable_not_shortage() {
        let path = std::env::temp_dir().join(format!("adega-busy-{}.db", Uuid::new_v4()));
        let config = DbConfig::new(&path)
            .max_connections(4)
            .busy_timeout(Duration::from_millis(200));
        let db = Database::new(config).await.unwrap();
        let (product_id, _, _) = seed_explicit(&db, 10, 2, 6).await;

        let mut holder = db.begin_stock_transaction().await.unwrap();
        holder.lock_product(&product_id).await.unwrap();

        let err = db
            .checkout()
            .record_sale(sale(vec![line(&product_id, VariantType::Unit, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StorageUnavailable(_)), "unexpected error: {err}");
        assert!(err.is_retryable());
        assert!(!err.is_stock_shortage());

        holder.rollback().await.unwrap();
        let receipt = db
            .checkout()
            .record_sale(sale(vec![line(&product_id, VariantType::Unit, 1)]))
            .await
            .unwrap();
        assert_eq!(receipt.items[0].units_deducted, 1);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
