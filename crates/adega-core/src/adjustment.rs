//! # Manual Stock Adjustments
//!
//! Purchases, returns, exits, losses and physical counts. Adjustments skip
//! the availability check: a count may legitimately go to zero, and a
//! correction may fix an impossible number.
//!
//! ## Targets
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  explicit variants  → the chosen variant's own counter                  │
//! │                       (packages move in packages, units in units)       │
//! │                                                                         │
//! │  virtual variants   → the legacy flat pool, in units                    │
//! │                       package adjustments move units_in_package each    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::stock;
use crate::types::MovementType;
use crate::validation::validate_quantity;
use crate::variant::{ProductWithVariants, VariantType};

/// What kind of manual movement is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Goods received.
    Entry,
    /// Customer return.
    Return,
    /// Stock leaving for a non-sale reason.
    Exit,
    Loss,
    /// Physical count: stock becomes exactly the given quantity.
    SetCount,
}

impl AdjustmentKind {
    /// Ledger category written for this kind.
    pub fn movement_type(&self) -> MovementType {
        match self {
            AdjustmentKind::Entry => MovementType::Purchase,
            AdjustmentKind::Return => MovementType::Return,
            AdjustmentKind::Exit | AdjustmentKind::SetCount => MovementType::InventoryAdjustment,
            AdjustmentKind::Loss => MovementType::Loss,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Entry => "entry",
            AdjustmentKind::Return => "return",
            AdjustmentKind::Exit => "exit",
            AdjustmentKind::Loss => "loss",
            AdjustmentKind::SetCount => "set_count",
        }
    }
}

impl fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdjustmentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entry" | "entrada" | "purchase" => Ok(AdjustmentKind::Entry),
            "return" | "devolucao" => Ok(AdjustmentKind::Return),
            "exit" | "saida" => Ok(AdjustmentKind::Exit),
            "loss" | "perda" => Ok(AdjustmentKind::Loss),
            "set_count" | "ajuste" | "count" => Ok(AdjustmentKind::SetCount),
            other => Err(ValidationError::InvalidFormat {
                field: "kind".to_string(),
                reason: format!("unknown adjustment kind '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Plan
// =============================================================================

/// A resolved adjustment, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AdjustmentPlan {
    pub product_id: String,
    pub variant_type: VariantType,
    pub kind: AdjustmentKind,
    /// Explicit variant being changed; `None` means the legacy flat pool.
    pub variant_id: Option<String>,
    pub requested_quantity: i64,
    /// Counter value before, in the target's own unit.
    pub previous_stock: i64,
    pub new_stock: i64,
    /// The requested exit was larger than the stock and stopped at zero.
    pub clamped: bool,
}

impl AdjustmentPlan {
    /// Resolves `kind` × `quantity` against the product's current stock.
    ///
    /// ## Rules
    /// - `SetCount` accepts zero; every other kind needs a positive quantity
    /// - `Exit` and `Loss` never push stock below zero
    pub fn plan(
        product: &ProductWithVariants,
        variant_type: VariantType,
        kind: AdjustmentKind,
        quantity: i64,
    ) -> CoreResult<Self> {
        match kind {
            AdjustmentKind::SetCount if quantity < 0 => {
                return Err(CoreError::InvalidQuantity { quantity });
            }
            AdjustmentKind::SetCount => {}
            _ if quantity <= 0 => return Err(CoreError::InvalidQuantity { quantity }),
            _ => validate_quantity(quantity)?,
        }

        let variant = product
            .variant(variant_type)
            .ok_or_else(|| CoreError::VariantNotConfigured {
                product_id: product.id().to_string(),
                variant_type,
            })?;

        // Virtual views are windows onto the flat pool, counted in units.
        let (variant_id, previous_stock, scale) = if product.is_virtual {
            (
                None,
                product.product.stock_quantity.max(0),
                variant.units_per_item().max(1),
            )
        } else {
            (Some(variant.id.clone()), variant.stock_quantity, 1)
        };

        let delta = quantity.saturating_mul(scale);
        let (new_stock, clamped) = match kind {
            AdjustmentKind::Entry | AdjustmentKind::Return => {
                (previous_stock.saturating_add(delta), false)
            }
            AdjustmentKind::Exit | AdjustmentKind::Loss => {
                let after = previous_stock - delta;
                (after.max(0), after < 0)
            }
            AdjustmentKind::SetCount if scale > 1 => {
                // Keep the loose remainder, replace the full packages.
                let (_, loose) = stock::package_breakdown(previous_stock, scale);
                (delta.saturating_add(loose), false)
            }
            AdjustmentKind::SetCount => (quantity, false),
        };

        Ok(AdjustmentPlan {
            product_id: product.id().to_string(),
            variant_type,
            kind,
            variant_id,
            requested_quantity: quantity,
            previous_stock,
            new_stock,
            clamped,
        })
    }

    /// Signed change actually applied.
    pub fn quantity_change(&self) -> i64 {
        self.new_stock - self.previous_stock
    }

    pub fn movement_type(&self) -> MovementType {
        self.kind.movement_type()
    }

    /// The change targets the legacy flat pool.
    pub fn is_legacy_pool(&self) -> bool {
        self.variant_id.is_none()
    }
}

// =============================================================================
// Preview
// =============================================================================

/// Unit, package and total counts at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSnapshot {
    pub units: i64,
    pub packages: i64,
    pub total_units: i64,
}

impl StockSnapshot {
    /// Current counts of a product.
    pub fn of(product: &ProductWithVariants) -> Self {
        StockSnapshot {
            units: product.unit_variant.as_ref().map_or(0, |v| v.stock_quantity),
            packages: product.package_variant.as_ref().map_or(0, |v| v.stock_quantity),
            total_units: product.total_stock_units,
        }
    }
}

/// Before/after counts for a proposed adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockPreview {
    pub current: StockSnapshot,
    pub after: StockSnapshot,
}

/// Shows what [`AdjustmentPlan::plan`] would do, without doing it.
///
/// ## Example
/// ```rust,ignore
/// // unit = 5, package = 2 × 6; receive 3 cases
/// let preview = preview_adjustment(&product, VariantType::Package, AdjustmentKind::Entry, 3)?;
/// assert_eq!(preview.after.packages, 5);
/// assert_eq!(preview.after.total_units, 35);
/// ```
pub fn preview_adjustment(
    product: &ProductWithVariants,
    variant_type: VariantType,
    kind: AdjustmentKind,
    quantity: i64,
) -> CoreResult<StockPreview> {
    let plan = AdjustmentPlan::plan(product, variant_type, kind, quantity)?;
    let current = StockSnapshot::of(product);
    let upp = product.units_in_package().unwrap_or(0);

    let after = if plan.is_legacy_pool() {
        let (packages, _) = stock::package_breakdown(plan.new_stock, upp);
        StockSnapshot {
            units: plan.new_stock,
            packages: if product.package_variant.is_some() { packages } else { 0 },
            total_units: plan.new_stock,
        }
    } else {
        let (units, packages) = match variant_type {
            VariantType::Unit => (plan.new_stock, current.packages),
            VariantType::Package => (current.units, plan.new_stock),
        };
        StockSnapshot {
            units,
            packages,
            total_units: stock::total_units(units, packages, upp),
        }
    };

    Ok(StockPreview { current, after })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::tests::{explicit_product, legacy_product};
    use crate::variant::SynthesisPolicy;

    fn virtual_product(stock: i64) -> ProductWithVariants {
        ProductWithVariants::assemble(
            legacy_product(stock, Some(6), true),
            vec![],
            &SynthesisPolicy::default(),
        )
    }

    #[test]
    fn test_entry_on_explicit_variant() {
        let plan = AdjustmentPlan::plan(&explicit_product(), VariantType::Package, AdjustmentKind::Entry, 3)
            .unwrap();
        assert_eq!(plan.previous_stock, 2);
        assert_eq!(plan.new_stock, 5);
        assert_eq!(plan.quantity_change(), 3);
        assert_eq!(plan.movement_type(), MovementType::Purchase);
        assert!(!plan.is_legacy_pool());
    }

    #[test]
    fn test_exit_clamps_at_zero() {
        let plan =
            AdjustmentPlan::plan(&explicit_product(), VariantType::Unit, AdjustmentKind::Loss, 8).unwrap();
        assert_eq!(plan.new_stock, 0);
        assert_eq!(plan.quantity_change(), -5);
        assert!(plan.clamped);
    }

    #[test]
    fn test_set_count_accepts_zero() {
        let plan =
            AdjustmentPlan::plan(&explicit_product(), VariantType::Unit, AdjustmentKind::SetCount, 0).unwrap();
        assert_eq!(plan.new_stock, 0);
        assert_eq!(plan.movement_type(), MovementType::InventoryAdjustment);
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(matches!(
            AdjustmentPlan::plan(&explicit_product(), VariantType::Unit, AdjustmentKind::Entry, 0),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            AdjustmentPlan::plan(&explicit_product(), VariantType::Unit, AdjustmentKind::SetCount, -1),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            AdjustmentPlan::plan(&explicit_product(), VariantType::Unit, AdjustmentKind::Entry, 100_000),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_virtual_package_entry_moves_units() {
        let plan =
            AdjustmentPlan::plan(&virtual_product(20), VariantType::Package, AdjustmentKind::Entry, 2).unwrap();
        assert!(plan.is_legacy_pool());
        assert_eq!(plan.previous_stock, 20);
        assert_eq!(plan.new_stock, 32);
    }

    #[test]
    fn test_virtual_package_count_keeps_loose_units() {
        // 20 = 3 × 6 + 2; counting 1 case leaves 6 + 2
        let plan = AdjustmentPlan::plan(&virtual_product(20), VariantType::Package, AdjustmentKind::SetCount, 1)
            .unwrap();
        assert_eq!(plan.new_stock, 8);
    }

    #[test]
    fn test_preview_explicit() {
        let preview =
            preview_adjustment(&explicit_product(), VariantType::Package, AdjustmentKind::Entry, 3).unwrap();
        assert_eq!(preview.current.total_units, 17);
        assert_eq!(preview.after.packages, 5);
        assert_eq!(preview.after.units, 5);
        assert_eq!(preview.after.total_units, 35);
    }

    #[test]
    fn test_preview_virtual() {
        let preview =
            preview_adjustment(&virtual_product(20), VariantType::Unit, AdjustmentKind::Exit, 9).unwrap();
        assert_eq!(preview.current.packages, 3);
        assert_eq!(preview.after.units, 11);
        assert_eq!(preview.after.packages, 1);
        assert_eq!(preview.after.total_units, 11);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("entry".parse::<AdjustmentKind>().unwrap(), AdjustmentKind::Entry);
        assert_eq!("SET_COUNT".parse::<AdjustmentKind>().unwrap(), AdjustmentKind::SetCount);
        assert!("gift".parse::<AdjustmentKind>().is_err());
    }
}
