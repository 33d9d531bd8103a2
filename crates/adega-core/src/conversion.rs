//! # Conversion Planning
//!
//! Computes what a package/unit conversion will do before anything is
//! written. The database layer applies a [`ConversionPlan`] inside one
//! transaction and appends the matching [`InventoryConversionLog`] row.
//!
//! ## Conservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  package_to_units(2), upp = 6                                           │
//! │                                                                         │
//! │            before                    after                              │
//! │   units     5                         5 + 2 × 6 = 17                    │
//! │   packages  3                         3 − 2     = 1                     │
//! │   total     5 + 3 × 6 = 23            17 + 1 × 6 = 23   ← unchanged    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A plan is only produced when every precondition holds, so a failed plan
//! means nothing was touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::stock;
use crate::variant::{ProductWithVariants, VariantType};

// =============================================================================
// Direction and Type
// =============================================================================

/// Which way stock moves across the package/unit boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConversionDirection {
    /// Open packages into loose units.
    PackageToUnits,
    /// Seal loose units into packages.
    UnitsToPackage,
}

impl ConversionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionDirection::PackageToUnits => "package_to_units",
            ConversionDirection::UnitsToPackage => "units_to_package",
        }
    }
}

impl fmt::Display for ConversionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion kind recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ConversionType {
    PackageToUnits,
    UnitsToPackage,
    /// Loose units consolidated back into packages by the system.
    AutoRestock,
}

impl ConversionType {
    pub fn direction(&self) -> ConversionDirection {
        match self {
            ConversionType::PackageToUnits => ConversionDirection::PackageToUnits,
            ConversionType::UnitsToPackage | ConversionType::AutoRestock => {
                ConversionDirection::UnitsToPackage
            }
        }
    }
}

impl From<ConversionDirection> for ConversionType {
    fn from(direction: ConversionDirection) -> Self {
        match direction {
            ConversionDirection::PackageToUnits => ConversionType::PackageToUnits,
            ConversionDirection::UnitsToPackage => ConversionType::UnitsToPackage,
        }
    }
}

// =============================================================================
// Conversion Plan
// =============================================================================

/// A validated conversion with before/after stock for both variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConversionPlan {
    pub product_id: String,
    pub conversion_type: ConversionType,
    pub unit_variant_id: String,
    pub package_variant_id: String,
    pub packages_converted: i64,
    pub units_converted: i64,
    pub units_per_package: i64,
    pub unit_stock_before: i64,
    pub unit_stock_after: i64,
    pub package_stock_before: i64,
    pub package_stock_after: i64,
}

impl ConversionPlan {
    /// Validates and plans converting `package_count` packages.
    ///
    /// ## Errors
    /// - `package_count <= 0` → [`CoreError::InvalidQuantity`]
    /// - virtual variants, or either variant missing → [`CoreError::VariantNotConfigured`]
    /// - package variant without a size → [`CoreError::InvalidConversion`]
    /// - source short of stock → [`CoreError::InsufficientStockForConversion`]
    pub fn plan(
        product: &ProductWithVariants,
        conversion_type: ConversionType,
        package_count: i64,
    ) -> CoreResult<Self> {
        if package_count <= 0 {
            return Err(CoreError::InvalidQuantity {
                quantity: package_count,
            });
        }

        let product_id = product.id();

        // Virtual variants share one pool; there is nothing to move between.
        if product.is_virtual {
            return Err(CoreError::VariantNotConfigured {
                product_id: product_id.to_string(),
                variant_type: VariantType::Package,
            });
        }

        let unit = product
            .unit_variant
            .as_ref()
            .ok_or_else(|| CoreError::VariantNotConfigured {
                product_id: product_id.to_string(),
                variant_type: VariantType::Unit,
            })?;
        let package = product
            .package_variant
            .as_ref()
            .ok_or_else(|| CoreError::VariantNotConfigured {
                product_id: product_id.to_string(),
                variant_type: VariantType::Package,
            })?;

        let units_per_package =
            product
                .units_in_package()
                .ok_or_else(|| CoreError::InvalidConversion {
                    product_id: product_id.to_string(),
                    reason: "package variant has no units_in_package".to_string(),
                })?;

        let units_converted = stock::units_from_packages(package_count, units_per_package);
        let direction = conversion_type.direction();

        let (unit_after, package_after) = match direction {
            ConversionDirection::PackageToUnits => {
                if package.stock_quantity < package_count {
                    return Err(CoreError::InsufficientStockForConversion {
                        product_id: product_id.to_string(),
                        direction,
                        available: package.stock_quantity,
                        required: package_count,
                    });
                }
                (
                    unit.stock_quantity + units_converted,
                    package.stock_quantity - package_count,
                )
            }
            ConversionDirection::UnitsToPackage => {
                if unit.stock_quantity < units_converted {
                    return Err(CoreError::InsufficientStockForConversion {
                        product_id: product_id.to_string(),
                        direction,
                        available: unit.stock_quantity,
                        required: units_converted,
                    });
                }
                (
                    unit.stock_quantity - units_converted,
                    package.stock_quantity + package_count,
                )
            }
        };

        Ok(ConversionPlan {
            product_id: product_id.to_string(),
            conversion_type,
            unit_variant_id: unit.id.clone(),
            package_variant_id: package.id.clone(),
            packages_converted: package_count,
            units_converted,
            units_per_package,
            unit_stock_before: unit.stock_quantity,
            unit_stock_after: unit_after,
            package_stock_before: package.stock_quantity,
            package_stock_after: package_after,
        })
    }

    /// Packages that can be sealed from the current loose units.
    ///
    /// Zero for virtual products, products missing either variant, or when
    /// fewer than one package worth of loose units exists.
    pub fn consolidation_count(product: &ProductWithVariants) -> i64 {
        if product.is_virtual || product.unit_variant.is_none() {
            return 0;
        }
        match (product.units_in_package(), product.unit_variant.as_ref()) {
            (Some(upp), Some(unit)) => stock::package_breakdown(unit.stock_quantity, upp).0,
            _ => 0,
        }
    }

    pub fn direction(&self) -> ConversionDirection {
        self.conversion_type.direction()
    }

    pub fn total_units_before(&self) -> i64 {
        stock::total_units(
            self.unit_stock_before,
            self.package_stock_before,
            self.units_per_package,
        )
    }

    pub fn total_units_after(&self) -> i64 {
        stock::total_units(
            self.unit_stock_after,
            self.package_stock_after,
            self.units_per_package,
        )
    }

    /// Builds the audit row for this plan.
    pub fn into_log(
        self,
        id: String,
        user_id: Option<String>,
        sale_id: Option<String>,
        reason: Option<String>,
        created_at: DateTime<Utc>,
    ) -> InventoryConversionLog {
        InventoryConversionLog {
            id,
            product_id: self.product_id,
            conversion_type: self.conversion_type,
            packages_converted: self.packages_converted,
            units_converted: self.units_converted,
            units_per_package: self.units_per_package,
            unit_stock_before: self.unit_stock_before,
            unit_stock_after: self.unit_stock_after,
            package_stock_before: self.package_stock_before,
            package_stock_after: self.package_stock_after,
            user_id,
            sale_id,
            reason,
            created_at,
        }
    }
}

// =============================================================================
// Conversion Log
// =============================================================================

/// Append-only audit record of one conversion.
///
/// Rows are never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryConversionLog {
    pub id: String,
    pub product_id: String,
    pub conversion_type: ConversionType,
    pub packages_converted: i64,
    pub units_converted: i64,
    pub units_per_package: i64,
    pub unit_stock_before: i64,
    pub unit_stock_after: i64,
    pub package_stock_before: i64,
    pub package_stock_after: i64,
    pub user_id: Option<String>,
    /// Set when the conversion was triggered by a sale.
    pub sale_id: Option<String>,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::tests::{explicit_product, legacy_product, variant};
    use crate::variant::SynthesisPolicy;

    fn product(units: i64, packages: i64, upp: i64) -> ProductWithVariants {
        ProductWithVariants::assemble(
            legacy_product(units + packages * upp, Some(upp), true),
            vec![
                variant("prod-1", VariantType::Unit, units, None),
                variant("prod-1", VariantType::Package, packages, Some(upp)),
            ],
            &SynthesisPolicy::default(),
        )
    }

    #[test]
    fn test_package_to_units() {
        let plan = ConversionPlan::plan(&explicit_product(), ConversionType::PackageToUnits, 1).unwrap();
        assert_eq!(plan.unit_stock_after, 11);
        assert_eq!(plan.package_stock_after, 1);
        assert_eq!(plan.units_converted, 6);
        assert_eq!(plan.total_units_before(), plan.total_units_after());
    }

    #[test]
    fn test_units_to_package() {
        let plan = ConversionPlan::plan(&product(13, 0, 6), ConversionType::UnitsToPackage, 2).unwrap();
        assert_eq!(plan.unit_stock_after, 1);
        assert_eq!(plan.package_stock_after, 2);
        assert_eq!(plan.total_units_after(), 13);
    }

    #[test]
    fn test_insufficient_packages() {
        let err = ConversionPlan::plan(&product(0, 1, 6), ConversionType::PackageToUnits, 2).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStockForConversion {
                direction: ConversionDirection::PackageToUnits,
                available: 1,
                required: 2,
                ..
            }
        ));
        assert!(err.is_stock_shortage());
    }

    #[test]
    fn test_insufficient_units() {
        let err = ConversionPlan::plan(&product(11, 0, 6), ConversionType::UnitsToPackage, 2).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStockForConversion { available: 11, required: 12, .. }
        ));
    }

    #[test]
    fn test_non_positive_count() {
        assert!(matches!(
            ConversionPlan::plan(&explicit_product(), ConversionType::PackageToUnits, 0),
            Err(CoreError::InvalidQuantity { quantity: 0 })
        ));
    }

    #[test]
    fn test_virtual_product_cannot_convert() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(20, Some(6), true),
            vec![],
            &SynthesisPolicy::default(),
        );
        assert!(matches!(
            ConversionPlan::plan(&pwv, ConversionType::PackageToUnits, 1),
            Err(CoreError::VariantNotConfigured { .. })
        ));
    }

    #[test]
    fn test_missing_unit_variant() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(12, Some(6), true),
            vec![variant("prod-1", VariantType::Package, 2, Some(6))],
            &SynthesisPolicy::default(),
        );
        assert!(matches!(
            ConversionPlan::plan(&pwv, ConversionType::PackageToUnits, 1),
            Err(CoreError::VariantNotConfigured {
                variant_type: VariantType::Unit,
                ..
            })
        ));
    }

    #[test]
    fn test_package_without_size() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(5, None, true),
            vec![
                variant("prod-1", VariantType::Unit, 5, None),
                variant("prod-1", VariantType::Package, 2, None),
            ],
            &SynthesisPolicy::default(),
        );
        assert!(matches!(
            ConversionPlan::plan(&pwv, ConversionType::PackageToUnits, 1),
            Err(CoreError::InvalidConversion { .. })
        ));
    }

    #[test]
    fn test_conservation_over_sequences() {
        for upp in 1..=12 {
            let mut units = 7;
            let mut packages = 9;
            let total = units + packages * upp;

            let steps = [
                (ConversionType::PackageToUnits, 3),
                (ConversionType::UnitsToPackage, 1),
                (ConversionType::PackageToUnits, 5),
                (ConversionType::AutoRestock, 2),
            ];
            for (conversion_type, count) in steps {
                let plan = ConversionPlan::plan(&product(units, packages, upp), conversion_type, count)
                    .unwrap();
                units = plan.unit_stock_after;
                packages = plan.package_stock_after;
                assert_eq!(units + packages * upp, total, "upp={upp}");
            }
        }
    }

    #[test]
    fn test_consolidation_count() {
        assert_eq!(ConversionPlan::consolidation_count(&product(13, 0, 6)), 2);
        assert_eq!(ConversionPlan::consolidation_count(&product(5, 4, 6)), 0);

        let virtual_product = ProductWithVariants::assemble(
            legacy_product(60, Some(6), true),
            vec![],
            &SynthesisPolicy::default(),
        );
        assert_eq!(ConversionPlan::consolidation_count(&virtual_product), 0);
    }

    #[test]
    fn test_into_log_copies_snapshot() {
        let plan = ConversionPlan::plan(&explicit_product(), ConversionType::PackageToUnits, 2).unwrap();
        let log = plan.into_log(
            "log-1".to_string(),
            Some("user-1".to_string()),
            None,
            Some("shelf refill".to_string()),
            Utc::now(),
        );
        assert_eq!(log.unit_stock_before, 5);
        assert_eq!(log.unit_stock_after, 17);
        assert_eq!(log.package_stock_before, 2);
        assert_eq!(log.package_stock_after, 0);
        assert_eq!(log.units_per_package, 6);
        assert_eq!(log.conversion_type, ConversionType::PackageToUnits);
    }

    #[test]
    fn test_auto_restock_moves_units_into_packages() {
        assert_eq!(
            ConversionType::AutoRestock.direction(),
            ConversionDirection::UnitsToPackage
        );
        assert_eq!(
            ConversionType::from(ConversionDirection::PackageToUnits),
            ConversionType::PackageToUnits
        );
    }
}
