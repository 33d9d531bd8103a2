//! # Inventory Service
//!
//! Pool-level entry points for everything except sales. Reads go straight
//! to the pool; each mutation opens its own [`StockTransaction`], runs one
//! operation and commits.

use sqlx::SqlitePool;
use tracing::debug;

use adega_core::validation::validate_quantity;
use adega_core::{
    check_availability, preview_adjustment, AdjustmentKind, AvailabilityDecision,
    ConversionDirection, CoreError, InventoryConversionLog, InventoryMovement, ProductVariant,
    ProductWithVariants, StockPreview, SynthesisPolicy, VariantType,
};

use crate::error::DbResult;
use crate::repository::conversion::ConversionLogRepository;
use crate::repository::movement::MovementRepository;
use crate::repository::product as product_repo;
use crate::repository::variant as variant_repo;
use crate::repository::variant::VariantRepository;
use crate::service::stock_tx::{StockAudit, StockTransaction};

/// Inventory operations over a connection pool.
#[derive(Debug, Clone)]
pub struct InventoryService {
    pool: SqlitePool,
    policy: SynthesisPolicy,
}

impl InventoryService {
    /// Creates a new InventoryService.
    pub fn new(pool: SqlitePool, policy: SynthesisPolicy) -> Self {
        InventoryService { pool, policy }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Product plus its explicit or synthesized variants. Read-only.
    ///
    /// Product and variants are read in one snapshot.
    pub async fn load_product_with_variants(&self, product_id: &str) -> DbResult<ProductWithVariants> {
        let mut tx = self.pool.begin().await?;

        let product = product_repo::fetch_product(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let variants = variant_repo::fetch_active_for_product(&mut *tx, product_id).await?;
        tx.commit().await?;

        debug!(
            product_id = %product_id,
            variants = variants.len(),
            "Loaded product with variants"
        );
        Ok(ProductWithVariants::assemble(product, variants, &self.policy))
    }

    pub async fn get_product_total_units(&self, product_id: &str) -> DbResult<i64> {
        Ok(self.load_product_with_variants(product_id).await?.total_stock_units)
    }

    /// Advisory availability check. Sales re-run it under the write lock.
    pub async fn check_variant_availability(
        &self,
        product_id: &str,
        variant_type: VariantType,
        quantity: i64,
    ) -> DbResult<AvailabilityDecision> {
        if quantity <= 0 {
            return Err(CoreError::InvalidQuantity { quantity }.into());
        }
        validate_quantity(quantity)?;

        let product = self.load_product_with_variants(product_id).await?;
        Ok(check_availability(&product, variant_type, quantity)?)
    }

    /// Before/after counts for an adjustment, without applying it.
    pub async fn preview_adjustment(
        &self,
        product_id: &str,
        variant_type: VariantType,
        kind: AdjustmentKind,
        quantity: i64,
    ) -> DbResult<StockPreview> {
        let product = self.load_product_with_variants(product_id).await?;
        Ok(preview_adjustment(&product, variant_type, kind, quantity)?)
    }

    /// Conversions of a product, newest first (default 10).
    pub async fn conversion_history(
        &self,
        product_id: &str,
        limit: Option<u32>,
    ) -> DbResult<Vec<InventoryConversionLog>> {
        ConversionLogRepository::new(self.pool.clone())
            .history(product_id, limit)
            .await
    }

    /// Ledger rows of a product, newest first (default 10).
    pub async fn movement_history(
        &self,
        product_id: &str,
        limit: Option<u32>,
    ) -> DbResult<Vec<InventoryMovement>> {
        MovementRepository::new(self.pool.clone())
            .history(product_id, limit)
            .await
    }

    /// Explicit variants at or below their minimum stock.
    pub async fn low_stock(&self, limit: u32) -> DbResult<Vec<ProductVariant>> {
        VariantRepository::new(self.pool.clone()).low_stock(limit).await
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Converts `package_count` packages in `direction`. All or nothing.
    pub async fn convert_stock(
        &self,
        product_id: &str,
        direction: ConversionDirection,
        package_count: i64,
        audit: &StockAudit,
    ) -> DbResult<InventoryConversionLog> {
        let mut tx = self.begin().await?;
        let log = tx
            .convert_stock(product_id, direction.into(), package_count, audit)
            .await?;
        tx.commit().await?;
        Ok(log)
    }

    /// Seals loose units into packages as an `auto_restock` conversion.
    pub async fn consolidate_loose_units(
        &self,
        product_id: &str,
        audit: &StockAudit,
    ) -> DbResult<Option<InventoryConversionLog>> {
        let mut tx = self.begin().await?;
        let log = tx.consolidate_loose_units(product_id, audit).await?;
        tx.commit().await?;
        Ok(log)
    }

    /// Manual entry, return, exit, loss or count.
    pub async fn adjust_stock(
        &self,
        product_id: &str,
        variant_type: VariantType,
        kind: AdjustmentKind,
        quantity: i64,
        audit: &StockAudit,
    ) -> DbResult<InventoryMovement> {
        let mut tx = self.begin().await?;
        let movement = tx
            .apply_adjustment(product_id, variant_type, kind, quantity, audit)
            .await?;
        tx.commit().await?;
        Ok(movement)
    }

    pub async fn enable_package_tracking(
        &self,
        product_id: &str,
        units_in_package: i64,
        package_price_cents: Option<i64>,
        audit: &StockAudit,
    ) -> DbResult<ProductWithVariants> {
        let mut tx = self.begin().await?;
        let product = tx
            .enable_package_tracking(product_id, units_in_package, package_price_cents, audit)
            .await?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn disable_package_tracking(&self, product_id: &str) -> DbResult<ProductWithVariants> {
        let mut tx = self.begin().await?;
        let product = tx.disable_package_tracking(product_id).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn begin(&self) -> DbResult<StockTransaction> {
        StockTransaction::begin(&self.pool, self.policy).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
