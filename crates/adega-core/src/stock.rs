//! # Stock Arithmetic
//!
//! Pure conversions between a raw unit count and a (packages, loose units)
//! breakdown.
//!
//! ## The Round-Trip Law
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  package_breakdown(20, 6) = (3, 2)                                      │
//! │                                                                         │
//! │     3 × 6 + 2 = 20   ← always holds for units_per_package > 0          │
//! │                                                                         │
//! │  package_breakdown(units_from_packages(p, u), u) = (p, 0)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `units_per_package` of zero or less means "this product is not
//! packaged": everything is loose.

/// Splits a unit count into full packages and loose units.
///
/// ## Rules
/// - `units_per_package <= 0` → `(0, total_units)` (no packaging)
/// - Negative totals are treated as empty stock
///
/// ## Example
/// ```rust
/// use adega_core::stock::package_breakdown;
///
/// assert_eq!(package_breakdown(20, 6), (3, 2));
/// assert_eq!(package_breakdown(18, 6), (3, 0));
/// assert_eq!(package_breakdown(5, 0), (0, 5));
/// ```
pub fn package_breakdown(total_units: i64, units_per_package: i64) -> (i64, i64) {
    let total_units = total_units.max(0);

    if units_per_package <= 0 {
        return (0, total_units);
    }

    (
        total_units / units_per_package,
        total_units % units_per_package,
    )
}

/// Number of units held in `packages` sealed packages.
///
/// ## Example
/// ```rust
/// use adega_core::stock::units_from_packages;
///
/// assert_eq!(units_from_packages(3, 6), 18);
/// assert_eq!(units_from_packages(0, 6), 0);
/// ```
pub fn units_from_packages(packages: i64, units_per_package: i64) -> i64 {
    packages.max(0).saturating_mul(units_per_package.max(0))
}

/// Total units across both representations.
///
/// This is the conserved quantity: `unit_stock + package_stock × units_per_package`.
pub fn total_units(unit_stock: i64, package_stock: i64, units_per_package: i64) -> i64 {
    unit_stock
        .max(0)
        .saturating_add(units_from_packages(package_stock, units_per_package))
}

/// Minimum number of packages to open so that `shortfall` more units exist.
///
/// Ceiling division. Returns 0 when there is no shortfall or no packaging.
///
/// ## Example
/// ```rust
/// use adega_core::stock::packages_to_cover;
///
/// assert_eq!(packages_to_cover(5, 6), 1);
/// assert_eq!(packages_to_cover(6, 6), 1);
/// assert_eq!(packages_to_cover(7, 6), 2);
/// assert_eq!(packages_to_cover(0, 6), 0);
/// ```
pub fn packages_to_cover(shortfall: i64, units_per_package: i64) -> i64 {
    if shortfall <= 0 || units_per_package <= 0 {
        return 0;
    }
    shortfall / units_per_package + i64::from(shortfall % units_per_package != 0)
}

// =============================================================================
// Unit Tests
// =============================================================================
