//! # Stock Transaction
//!
//! The unit of work every stock mutation runs in. One open SQLite
//! transaction; availability check, conversion, decrement and ledger writes
//! all go through it and land (or vanish) together.
//!
//! ## Check-then-act
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  UPDATE products SET updated_at = updated_at WHERE id = ?               │
//! │    │   first statement is a write: takes the database write lock       │
//! │    │   before any stock is read, so a second sale on the same product  │
//! │    │   waits here (busy_timeout) instead of reading stale stock        │
//! │    ▼                                                                    │
//! │  load product + variants → check → convert → decrement → ledger        │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  COMMIT  (or drop → ROLLBACK)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Contract
//! Domain errors (`DbError::Domain`) are raised while planning, before the
//! operation writes anything, so the transaction is still usable. Any other
//! error leaves it in an unknown state: drop it.
//!
//! ## Legacy Mirror
//! After a mutation of explicit variants, `products.stock_quantity` is
//! rewritten to `total_stock_units` in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use adega_core::stock;
use adega_core::validation::{
    normalize_reason, validate_price_cents, validate_quantity, validate_units_in_package,
};
use adega_core::{
    check_availability, AdjustmentKind, AdjustmentPlan, AvailabilityDecision, ConversionPlan,
    ConversionType, CoreError, InventoryConversionLog, InventoryMovement, MovementType,
    ProductVariant, ProductWithVariants, SynthesisPolicy, VariantType,
};

use crate::error::{DbError, DbResult};
use crate::repository::conversion as conversion_log;
use crate::repository::movement as ledger;
use crate::repository::product as product_repo;
use crate::repository::variant as variant_repo;

// =============================================================================
// Audit Context
// =============================================================================

/// Who asked for a stock change, and why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockAudit {
    pub user_id: Option<String>,
    pub reason: Option<String>,
    /// Set when the change belongs to a sale.
    pub sale_id: Option<String>,
}

impl StockAudit {
    /// Change requested by a user.
    pub fn by(user_id: impl Into<String>) -> Self {
        StockAudit {
            user_id: Some(user_id.into()),
            ..StockAudit::default()
        }
    }

    /// Change made by the engine itself.
    pub fn system() -> Self {
        StockAudit::default()
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn for_sale(mut self, sale_id: impl Into<String>) -> Self {
        self.sale_id = Some(sale_id.into());
        self
    }
}

// =============================================================================
// Results
// =============================================================================

/// What a decrement did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDecrement {
    pub product_id: String,
    /// `None` when the legacy flat pool was decremented.
    pub variant_id: Option<String>,
    pub variant_type: VariantType,
    /// Quantity in the variant's own unit.
    pub quantity: i64,
    pub units_deducted: i64,
    /// Counter before and after (variant counter, or flat pool in units).
    pub previous_stock: i64,
    pub new_stock: i64,
    pub movement_id: String,
}

/// Everything one sale line did to stock.
#[derive(Debug, Clone)]
pub struct LineFulfillment {
    pub product_name: String,
    /// The sold variant as it was priced when the line was taken.
    pub variant: ProductVariant,
    pub decision: AvailabilityDecision,
    /// Packages opened to cover a unit shortfall.
    pub conversion: Option<InventoryConversionLog>,
    pub decrement: StockDecrement,
}

/// One ledger row to write.
struct LedgerEntry<'a> {
    product_id: &'a str,
    variant_id: Option<&'a str>,
    variant_type: VariantType,
    movement_type: MovementType,
    previous_stock: i64,
    new_stock: i64,
    conversion_id: Option<&'a str>,
}

// =============================================================================
// Stock Transaction
// =============================================================================

/// An open stock unit of work.
///
/// ## Usage
/// ```rust,ignore
/// let mut tx = db.begin_stock_transaction().await?;
/// let decision = tx.check_variant_availability(&id, VariantType::Unit, 10).await?;
/// if decision.needs_conversion {
///     tx.convert_stock(&id, ConversionType::PackageToUnits, decision.packages_convertible, &audit).await?;
/// }
/// tx.decrement_product_stock(&id, &unit_variant_id, 10, &audit).await?;
/// tx.commit().await?;
/// ```
pub struct StockTransaction {
    tx: Transaction<'static, Sqlite>,
    policy: SynthesisPolicy,
    locked: HashSet<String>,
}

impl std::fmt::Debug for StockTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockTransaction")
            .field("policy", &self.policy)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl StockTransaction {
    /// Opens a transaction on a pooled connection.
    pub(crate) async fn begin(pool: &SqlitePool, policy: SynthesisPolicy) -> DbResult<Self> {
        let tx = pool.begin().await?;
        debug!("Stock transaction opened");

        Ok(StockTransaction {
            tx,
            policy,
            locked: HashSet::new(),
        })
    }

    /// Takes the write lock for a product's stock.
    ///
    /// Idempotent within the transaction.
    pub async fn lock_product(&mut self, product_id: &str) -> DbResult<()> {
        if self.locked.contains(product_id) {
            return Ok(());
        }

        if !product_repo::touch(&mut *self.tx, product_id).await? {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }

        debug!(product_id = %product_id, "Product stock locked");
        self.locked.insert(product_id.to_string());
        Ok(())
    }

    /// Loads a product with its explicit or synthesized variants.
    ///
    /// Always reads fresh rows: earlier steps of this transaction may have
    /// moved stock.
    pub async fn load_product(&mut self, product_id: &str) -> DbResult<ProductWithVariants> {
        self.lock_product(product_id).await?;

        let product = product_repo::fetch_product(&mut *self.tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let variants = variant_repo::fetch_active_for_product(&mut *self.tx, product_id).await?;

        let assembled = ProductWithVariants::assemble(product, variants, &self.policy);
        if assembled.units_in_package_is_fallback {
            warn!(
                product_id = %product_id,
                units_in_package = ?assembled.units_in_package(),
                "Legacy product has no package size; using configured fallback"
            );
        }

        Ok(assembled)
    }

    /// `unit + package × units_in_package`, or the flat pool for legacy products.
    pub async fn get_product_total_units(&mut self, product_id: &str) -> DbResult<i64> {
        Ok(self.load_product(product_id).await?.total_stock_units)
    }

    /// Availability decision against the locked, current stock.
    pub async fn check_variant_availability(
        &mut self,
        product_id: &str,
        variant_type: VariantType,
        quantity: i64,
    ) -> DbResult<AvailabilityDecision> {
        let product = self.load_product(product_id).await?;
        Ok(check_availability(&product, variant_type, quantity)?)
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Moves stock across the package/unit boundary and appends the audit row.
    ///
    /// Total units are unchanged. Two `conversion` ledger rows are written,
    /// one per variant, pointing at the log row.
    ///
    /// ## Errors
    /// - [`CoreError::InsufficientStockForConversion`] when the source is short
    /// - [`CoreError::VariantNotConfigured`] for legacy products or a missing
    ///   variant
    pub async fn convert_stock(
        &mut self,
        product_id: &str,
        conversion_type: ConversionType,
        package_count: i64,
        audit: &StockAudit,
    ) -> DbResult<InventoryConversionLog> {
        let product = self.load_product(product_id).await?;
        let plan = ConversionPlan::plan(&product, conversion_type, package_count)?;
        let reason = normalize_reason(audit.reason.as_deref())?;
        let now = Utc::now();

        self.write_variant_stock(&plan.unit_variant_id, plan.unit_stock_before, plan.unit_stock_after, now)
            .await?;
        self.write_variant_stock(
            &plan.package_variant_id,
            plan.package_stock_before,
            plan.package_stock_after,
            now,
        )
        .await?;

        let log = plan.clone().into_log(
            Uuid::new_v4().to_string(),
            audit.user_id.clone(),
            audit.sale_id.clone(),
            reason.clone(),
            now,
        );
        conversion_log::append(&mut *self.tx, &log).await?;

        self.write_movement(
            LedgerEntry {
                product_id,
                variant_id: Some(&plan.unit_variant_id),
                variant_type: VariantType::Unit,
                movement_type: MovementType::Conversion,
                previous_stock: plan.unit_stock_before,
                new_stock: plan.unit_stock_after,
                conversion_id: Some(&log.id),
            },
            audit,
            reason.clone(),
            now,
        )
        .await?;
        self.write_movement(
            LedgerEntry {
                product_id,
                variant_id: Some(&plan.package_variant_id),
                variant_type: VariantType::Package,
                movement_type: MovementType::Conversion,
                previous_stock: plan.package_stock_before,
                new_stock: plan.package_stock_after,
                conversion_id: Some(&log.id),
            },
            audit,
            reason,
            now,
        )
        .await?;

        self.mirror_legacy_stock(product_id, now).await?;

        info!(
            product_id = %product_id,
            conversion_type = ?conversion_type,
            packages = plan.packages_converted,
            units = plan.units_converted,
            sale_id = ?audit.sale_id,
            "Stock converted"
        );

        Ok(log)
    }

    // =========================================================================
    // Decrement
    // =========================================================================

    /// Removes `quantity` of one variant, refusing to go below zero.
    ///
    /// `variant_id` may be a synthesized id, in which case the legacy flat
    /// pool loses `quantity × units_per_item` units. Writes a `sale` ledger
    /// row.
    pub async fn decrement_product_stock(
        &mut self,
        product_id: &str,
        variant_id: &str,
        quantity: i64,
        audit: &StockAudit,
    ) -> DbResult<StockDecrement> {
        if quantity <= 0 {
            return Err(CoreError::InvalidQuantity { quantity }.into());
        }
        validate_quantity(quantity)?;

        let product = self.load_product(product_id).await?;
        let variant = [product.unit_variant.as_ref(), product.package_variant.as_ref()]
            .into_iter()
            .flatten()
            .find(|v| v.id == variant_id)
            .cloned()
            .ok_or_else(|| DbError::not_found("ProductVariant", variant_id))?;

        let shortage = || CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            variant_type: variant.variant_type,
            available: variant.stock_quantity,
            requested: quantity,
        };

        let reason = normalize_reason(audit.reason.as_deref())?;
        let now = Utc::now();
        let units_deducted = stock::units_from_packages(quantity, variant.units_per_item());

        let (stored_variant_id, previous_stock, new_stock) = if product.is_virtual {
            let previous = product.product.stock_quantity;
            if !product_repo::decrement_legacy_stock(&mut *self.tx, product_id, units_deducted, now).await? {
                return Err(shortage().into());
            }
            (None, previous, previous - units_deducted)
        } else {
            if !variant_repo::decrement_stock(&mut *self.tx, &variant.id, quantity, now).await? {
                return Err(shortage().into());
            }
            self.mirror_legacy_stock(product_id, now).await?;
            (
                Some(variant.id.clone()),
                variant.stock_quantity,
                variant.stock_quantity - quantity,
            )
        };

        let movement = self
            .write_movement(
                LedgerEntry {
                    product_id,
                    variant_id: stored_variant_id.as_deref(),
                    variant_type: variant.variant_type,
                    movement_type: MovementType::Sale,
                    previous_stock,
                    new_stock,
                    conversion_id: None,
                },
                audit,
                reason,
                now,
            )
            .await?;

        debug!(
            product_id = %product_id,
            variant_type = %variant.variant_type,
            quantity,
            units_deducted,
            "Stock decremented"
        );

        Ok(StockDecrement {
            product_id: product_id.to_string(),
            variant_id: stored_variant_id,
            variant_type: variant.variant_type,
            quantity,
            units_deducted,
            previous_stock,
            new_stock,
            movement_id: movement.id,
        })
    }

    /// One sale line: check, open packages if needed, decrement.
    ///
    /// The availability check runs here, under the lock, whatever the caller
    /// computed beforehand.
    pub async fn sell_line(
        &mut self,
        product_id: &str,
        variant_type: VariantType,
        quantity: i64,
        audit: &StockAudit,
    ) -> DbResult<LineFulfillment> {
        if quantity <= 0 {
            return Err(CoreError::InvalidQuantity { quantity }.into());
        }
        validate_quantity(quantity)?;

        let product = self.load_product(product_id).await?;
        if !product.product.is_active {
            return Err(CoreError::ProductNotFound(product_id.to_string()).into());
        }

        let decision = check_availability(&product, variant_type, quantity)?.ensure_fulfillable(product_id)?;
        let variant = product
            .variant(variant_type)
            .cloned()
            .ok_or_else(|| CoreError::VariantNotConfigured {
                product_id: product_id.to_string(),
                variant_type,
            })?;

        let conversion = if decision.needs_conversion {
            Some(
                self.convert_stock(
                    product_id,
                    ConversionType::PackageToUnits,
                    decision.packages_convertible,
                    audit,
                )
                .await?,
            )
        } else {
            None
        };

        let decrement = self
            .decrement_product_stock(product_id, &variant.id, quantity, audit)
            .await?;

        Ok(LineFulfillment {
            product_name: product.product.name,
            variant,
            decision,
            conversion,
            decrement,
        })
    }

    // =========================================================================
    // Adjustments and Package Tracking
    // =========================================================================

    /// Applies a manual adjustment. No availability check; exits clamp at zero.
    pub async fn apply_adjustment(
        &mut self,
        product_id: &str,
        variant_type: VariantType,
        kind: AdjustmentKind,
        quantity: i64,
        audit: &StockAudit,
    ) -> DbResult<InventoryMovement> {
        let product = self.load_product(product_id).await?;
        let plan = AdjustmentPlan::plan(&product, variant_type, kind, quantity)?;
        let reason = normalize_reason(audit.reason.as_deref())?;
        let now = Utc::now();

        if plan.clamped {
            warn!(
                product_id = %product_id,
                variant_type = %variant_type,
                requested = quantity,
                available = plan.previous_stock,
                "Adjustment exceeds stock; clamped at zero"
            );
        }

        match plan.variant_id.as_deref() {
            None => {
                product_repo::set_legacy_stock(&mut *self.tx, product_id, plan.new_stock, now).await?;
            }
            Some(id) => {
                self.write_variant_stock(id, plan.previous_stock, plan.new_stock, now)
                    .await?;
                self.mirror_legacy_stock(product_id, now).await?;
            }
        }

        let movement = self
            .write_movement(
                LedgerEntry {
                    product_id,
                    variant_id: plan.variant_id.as_deref(),
                    variant_type,
                    movement_type: plan.movement_type(),
                    previous_stock: plan.previous_stock,
                    new_stock: plan.new_stock,
                    conversion_id: None,
                },
                audit,
                reason,
                now,
            )
            .await?;

        info!(
            product_id = %product_id,
            variant_type = %variant_type,
            kind = %kind,
            change = plan.quantity_change(),
            "Stock adjusted"
        );

        Ok(movement)
    }

    /// Turns a legacy product into explicit unit and package variants.
    ///
    /// The flat stock is split with `package_breakdown`: full packages go to
    /// the package variant, the remainder stays loose. Total units are
    /// unchanged. A product that already has a unit variant only gains an
    /// empty package variant.
    pub async fn enable_package_tracking(
        &mut self,
        product_id: &str,
        units_in_package: i64,
        package_price_cents: Option<i64>,
        audit: &StockAudit,
    ) -> DbResult<ProductWithVariants> {
        validate_units_in_package(units_in_package)?;
        if let Some(cents) = package_price_cents {
            validate_price_cents(cents)?;
        }

        let current = self.load_product(product_id).await?;
        if !current.is_virtual && current.package_variant.is_some() {
            return Err(DbError::duplicate("package_variant", product_id));
        }

        let reason = normalize_reason(audit.reason.as_deref())?;
        let now = Utc::now();
        let product = &current.product;

        let package_price = package_price_cents
            .or(product.package_price_cents)
            .unwrap_or_else(|| {
                product
                    .price()
                    .multiply_quantity(units_in_package)
                    .apply_percentage_discount(self.policy.package_discount_bps)
                    .cents()
            });

        let (package_stock, mut created) = if current.is_virtual {
            let (packages, loose) = stock::package_breakdown(product.stock_quantity, units_in_package);

            let mut unit = variant_repo::new_variant(
                product_id,
                VariantType::Unit,
                loose,
                None,
                product.price_cents,
                now,
            );
            unit.cost_price_cents = product.cost_price_cents;
            unit.barcode = product.barcode.clone();
            unit.minimum_stock = product.minimum_stock.max(0);
            variant_repo::insert_variant(&mut *self.tx, &unit).await?;

            (packages, vec![unit])
        } else {
            (0, Vec::new())
        };

        let mut package = variant_repo::new_variant(
            product_id,
            VariantType::Package,
            package_stock,
            Some(units_in_package),
            package_price,
            now,
        );
        package.cost_price_cents = product.cost_price_cents.map(|c| c * units_in_package);
        package.barcode = product.package_barcode.clone();
        variant_repo::insert_variant(&mut *self.tx, &package).await?;
        created.push(package);

        product_repo::set_package_tracking(
            &mut *self.tx,
            product_id,
            true,
            Some(units_in_package),
            package_price_cents,
            now,
        )
        .await?;

        for variant in &created {
            self.write_movement(
                LedgerEntry {
                    product_id,
                    variant_id: Some(&variant.id),
                    variant_type: variant.variant_type,
                    movement_type: MovementType::InitialStock,
                    previous_stock: 0,
                    new_stock: variant.stock_quantity,
                    conversion_id: None,
                },
                audit,
                reason.clone(),
                now,
            )
            .await?;
        }

        self.mirror_legacy_stock(product_id, now).await?;
        let updated = self.load_product(product_id).await?;

        info!(
            product_id = %product_id,
            units_in_package,
            total_units = updated.total_stock_units,
            "Package tracking enabled"
        );

        Ok(updated)
    }

    /// Retires the explicit variants and folds their total back into the
    /// flat stock. The product is left without package data.
    pub async fn disable_package_tracking(&mut self, product_id: &str) -> DbResult<ProductWithVariants> {
        let current = self.load_product(product_id).await?;
        let now = Utc::now();

        if !current.is_virtual {
            let retired = variant_repo::deactivate_for_product(&mut *self.tx, product_id, now).await?;
            product_repo::set_legacy_stock(&mut *self.tx, product_id, current.total_stock_units, now)
                .await?;
            debug!(product_id = %product_id, retired, "Variants deactivated");
        }
        product_repo::clear_package_data(&mut *self.tx, product_id, now).await?;

        let updated = self.load_product(product_id).await?;
        info!(
            product_id = %product_id,
            total_units = updated.total_stock_units,
            "Package tracking disabled"
        );

        Ok(updated)
    }

    /// Seals as many packages as the loose units allow (`auto_restock`).
    ///
    /// `None` when there is less than one package of loose units.
    pub async fn consolidate_loose_units(
        &mut self,
        product_id: &str,
        audit: &StockAudit,
    ) -> DbResult<Option<InventoryConversionLog>> {
        let product = self.load_product(product_id).await?;
        let packages = ConversionPlan::consolidation_count(&product);
        if packages == 0 {
            return Ok(None);
        }

        let log = self
            .convert_stock(product_id, ConversionType::AutoRestock, packages, audit)
            .await?;
        Ok(Some(log))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn write_variant_stock(
        &mut self,
        variant_id: &str,
        expected: i64,
        new_stock: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        // Only possible if a writer slipped past the product lock.
        if !variant_repo::set_stock(&mut *self.tx, variant_id, expected, new_stock, now).await? {
            return Err(DbError::TransactionConflict(format!(
                "variant {} changed during the transaction",
                variant_id
            )));
        }
        Ok(())
    }

    async fn mirror_legacy_stock(&mut self, product_id: &str, now: DateTime<Utc>) -> DbResult<i64> {
        let variants = variant_repo::fetch_active_for_product(&mut *self.tx, product_id).await?;

        let total: i64 = variants.iter().map(ProductVariant::stock_in_units).sum();

        product_repo::set_legacy_stock(&mut *self.tx, product_id, total, now).await?;
        Ok(total)
    }

    async fn write_movement(
        &mut self,
        entry: LedgerEntry<'_>,
        audit: &StockAudit,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> DbResult<InventoryMovement> {
        let movement = InventoryMovement {
            id: Uuid::new_v4().to_string(),
            product_id: entry.product_id.to_string(),
            variant_id: entry.variant_id.map(str::to_string),
            variant_type: Some(entry.variant_type),
            movement_type: entry.movement_type,
            quantity_change: entry.new_stock - entry.previous_stock,
            previous_stock: entry.previous_stock,
            new_stock: entry.new_stock,
            reason,
            user_id: audit.user_id.clone(),
            sale_id: audit.sale_id.clone(),
            conversion_id: entry.conversion_id.map(str::to_string),
            created_at: now,
        };
        ledger::insert(&mut *self.tx, &movement).await?;
        Ok(movement)
    }

    /// Raw connection for writes that belong in this transaction.
    pub(crate) fn conn(&mut self) -> &mut sqlx::SqliteConnection {
        &mut *self.tx
    }

    /// Commits every change made through this transaction.
    pub async fn commit(self) -> DbResult<()> {
        self.tx.commit().await?;
        debug!(products = self.locked.len(), "Stock transaction committed");
        Ok(())
    }

    /// Discards every change. Dropping the transaction does the same.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await?;
        debug!("Stock transaction rolled back");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
