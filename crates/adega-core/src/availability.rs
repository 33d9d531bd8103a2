//! # Availability Checker
//!
//! Decides whether a request for N units or N packages can be fulfilled,
//! and whether opening packages would make it fulfillable. Never mutates.
//!
//! ## Decision Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  check_availability(product, type, qty)                                 │
//! │       │                                                                 │
//! │       ├── qty <= 0 → Err(InvalidQuantity)                               │
//! │       │                                                                 │
//! │       ├── variant missing → can_fulfill = false, current_stock = 0      │
//! │       │                                                                 │
//! │       ├── PACKAGE: packages >= qty ?                                    │
//! │       │            (loose units are never assembled into packages)      │
//! │       │                                                                 │
//! │       └── UNIT:    units >= qty ?                                       │
//! │                    └── no: units + packages × upp >= qty ?              │
//! │                             └── yes: needs_conversion,                  │
//! │                                      packages = ceil(shortfall / upp)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The decision is advisory. The sale integration re-runs it inside the
//! write transaction, so a client-side precomputation is never trusted.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::stock;
use crate::variant::{ProductWithVariants, VariantType};

/// Outcome of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AvailabilityDecision {
    pub variant_type: VariantType,
    pub requested_quantity: i64,
    /// A variant of the requested type exists.
    pub variant_configured: bool,
    pub can_fulfill: bool,
    /// Stock of the requested variant, in its own unit.
    pub current_stock: i64,
    /// The product's total units across both variants.
    pub total_units_available: i64,
    pub needs_conversion: bool,
    /// Minimum packages to open before fulfilling (0 unless `needs_conversion`).
    pub packages_convertible: i64,
    /// Largest quantity of the requested variant obtainable right now,
    /// counting convertible packages.
    pub max_fulfillable: i64,
}

impl AvailabilityDecision {
    /// Turns a negative decision into the matching error.
    ///
    /// - variant missing → [`CoreError::VariantNotConfigured`]
    /// - not enough stock → [`CoreError::InsufficientStock`]
    pub fn ensure_fulfillable(self, product_id: &str) -> CoreResult<Self> {
        if !self.variant_configured {
            return Err(CoreError::VariantNotConfigured {
                product_id: product_id.to_string(),
                variant_type: self.variant_type,
            });
        }

        if !self.can_fulfill {
            return Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                variant_type: self.variant_type,
                available: self.max_fulfillable,
                requested: self.requested_quantity,
            });
        }

        Ok(self)
    }
}

/// Checks whether `quantity` of `variant_type` can be fulfilled.
///
/// ## Example
/// ```rust,ignore
/// // unit = 5, package = 2 × 6, request 10 units
/// let decision = check_availability(&product, VariantType::Unit, 10)?;
/// assert!(decision.can_fulfill);
/// assert!(decision.needs_conversion);
/// assert_eq!(decision.packages_convertible, 1); // 5 + 6 = 11 >= 10
/// ```
pub fn check_availability(
    product: &ProductWithVariants,
    variant_type: VariantType,
    quantity: i64,
) -> CoreResult<AvailabilityDecision> {
    if quantity <= 0 {
        return Err(CoreError::InvalidQuantity { quantity });
    }

    let mut decision = AvailabilityDecision {
        variant_type,
        requested_quantity: quantity,
        variant_configured: false,
        can_fulfill: false,
        current_stock: 0,
        total_units_available: product.total_stock_units,
        needs_conversion: false,
        packages_convertible: 0,
        max_fulfillable: 0,
    };

    let Some(variant) = product.variant(variant_type) else {
        return Ok(decision);
    };

    decision.variant_configured = true;
    decision.current_stock = variant.stock_quantity;
    decision.max_fulfillable = variant.stock_quantity;

    if variant.stock_quantity >= quantity {
        decision.can_fulfill = true;
        return Ok(decision);
    }

    // Packages are never assembled from loose units on demand, and a
    // legacy pool has nothing to convert: its views share the same units.
    if variant_type == VariantType::Package || product.is_virtual {
        return Ok(decision);
    }

    let Some(units_per_package) = product.units_in_package() else {
        return Ok(decision);
    };
    let packages = product
        .package_variant
        .as_ref()
        .map_or(0, |p| p.stock_quantity);

    let reachable = stock::total_units(variant.stock_quantity, packages, units_per_package);
    decision.max_fulfillable = reachable;

    if reachable >= quantity {
        decision.can_fulfill = true;
        decision.needs_conversion = true;
        decision.packages_convertible =
            stock::packages_to_cover(quantity - variant.stock_quantity, units_per_package);
    }

    Ok(decision)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::tests::{explicit_product, legacy_product, variant};
    use crate::variant::SynthesisPolicy;

    #[test]
    fn test_unit_sale_from_unit_stock() {
        let decision = check_availability(&explicit_product(), VariantType::Unit, 4).unwrap();
        assert!(decision.can_fulfill);
        assert!(!decision.needs_conversion);
        assert_eq!(decision.current_stock, 5);
        assert_eq!(decision.total_units_available, 17);
    }

    #[test]
    fn test_unit_sale_needs_one_package() {
        let decision = check_availability(&explicit_product(), VariantType::Unit, 10).unwrap();
        assert!(decision.can_fulfill);
        assert!(decision.needs_conversion);
        assert_eq!(decision.packages_convertible, 1);
        assert_eq!(decision.max_fulfillable, 17);
    }

    #[test]
    fn test_unit_sale_needs_both_packages() {
        let decision = check_availability(&explicit_product(), VariantType::Unit, 17).unwrap();
        assert!(decision.can_fulfill);
        assert_eq!(decision.packages_convertible, 2);
    }

    #[test]
    fn test_unit_sale_beyond_total() {
        let decision = check_availability(&explicit_product(), VariantType::Unit, 18).unwrap();
        assert!(!decision.can_fulfill);
        assert!(!decision.needs_conversion);
        assert_eq!(decision.packages_convertible, 0);

        let err = decision.ensure_fulfillable("prod-1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 17, requested: 18, .. }
        ));
    }

    #[test]
    fn test_package_shortfall_has_no_conversion_path() {
        let decision = check_availability(&explicit_product(), VariantType::Package, 3).unwrap();
        assert!(!decision.can_fulfill);
        assert!(!decision.needs_conversion);
        assert_eq!(decision.current_stock, 2);
    }

    #[test]
    fn test_invalid_quantity() {
        assert!(matches!(
            check_availability(&explicit_product(), VariantType::Unit, 0),
            Err(CoreError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            check_availability(&explicit_product(), VariantType::Unit, -3),
            Err(CoreError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_missing_variant() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(8, None, false),
            vec![variant("prod-1", VariantType::Unit, 8, None)],
            &SynthesisPolicy::default(),
        );
        let decision = check_availability(&pwv, VariantType::Package, 1).unwrap();
        assert!(!decision.can_fulfill);
        assert!(!decision.variant_configured);
        assert_eq!(decision.current_stock, 0);
        assert!(matches!(
            decision.ensure_fulfillable("prod-1"),
            Err(CoreError::VariantNotConfigured { .. })
        ));
    }

    #[test]
    fn test_unit_request_without_unit_variant() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(0, Some(6), true),
            vec![variant("prod-1", VariantType::Package, 4, Some(6))],
            &SynthesisPolicy::default(),
        );
        let decision = check_availability(&pwv, VariantType::Unit, 1).unwrap();
        assert!(!decision.can_fulfill);
        assert_eq!(decision.current_stock, 0);
    }

    #[test]
    fn test_virtual_product_never_converts() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(20, Some(6), true),
            vec![],
            &SynthesisPolicy::default(),
        );
        let units = check_availability(&pwv, VariantType::Unit, 20).unwrap();
        assert!(units.can_fulfill && !units.needs_conversion);

        let too_many = check_availability(&pwv, VariantType::Unit, 21).unwrap();
        assert!(!too_many.can_fulfill);
        assert_eq!(too_many.max_fulfillable, 20);

        let packages = check_availability(&pwv, VariantType::Package, 3).unwrap();
        assert!(packages.can_fulfill);
    }
}
