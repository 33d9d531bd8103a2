//! # Variant Model
//!
//! A product is sold either as loose units, as sealed packages, or both.
//! Each representation is a [`ProductVariant`] with its own stock counter,
//! price and barcode.
//!
//! ## Explicit vs Virtual Variants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Where a product's variants come from                   │
//! │                                                                         │
//! │  product_variants rows exist?                                          │
//! │       │                                                                 │
//! │       ├── YES → explicit variants, independent stock counters          │
//! │       │         total = units + packages × units_in_package            │
//! │       │                                                                 │
//! │       └── NO  → synthesize_variants(product)  (legacy flat fields)     │
//! │                 unit view    = stock_quantity                          │
//! │                 package view = floor(stock_quantity / upp)             │
//! │                 total        = stock_quantity (one shared pool)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Virtual variants are read-only views over the legacy pool: the package
//! view is a breakdown of the same units, never extra stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::stock;
use crate::types::Product;
use crate::{DEFAULT_LEGACY_UNITS_PER_PACKAGE, DEFAULT_PACKAGE_DISCOUNT_BPS};

// =============================================================================
// Variant Type
// =============================================================================

/// The two sellable representations of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    /// Loose individual units (one bottle).
    Unit,
    /// Sealed packages of `units_in_package` units (one case).
    Package,
}

impl VariantType {
    /// Stable string form, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Unit => "unit",
            VariantType::Package => "package",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unit" | "units" => Ok(VariantType::Unit),
            "package" | "packages" | "pack" => Ok(VariantType::Package),
            other => Err(ValidationError::InvalidFormat {
                field: "variant_type".to_string(),
                reason: format!("unknown variant type '{}', expected unit or package", other),
            }),
        }
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// One sellable representation of a product.
///
/// ## Invariants
/// - `stock_quantity >= 0`
/// - `units_in_package` is `None` for units, `Some(n > 0)` for packages
/// - At most one active variant per (product, type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub variant_type: VariantType,
    /// Stock counted in this variant's own unit (bottles or cases).
    pub stock_quantity: i64,
    /// Conversion factor; only set for packages.
    pub units_in_package: Option<i64>,
    pub price_cents: i64,
    pub cost_price_cents: Option<i64>,
    pub barcode: Option<String>,
    /// Low-stock threshold, in this variant's own unit.
    pub minimum_stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Returns the price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// How many units one item of this variant holds (1 for units).
    pub fn units_per_item(&self) -> i64 {
        match self.variant_type {
            VariantType::Unit => 1,
            VariantType::Package => self.units_in_package.unwrap_or(0),
        }
    }

    /// This variant's stock expressed in units.
    pub fn stock_in_units(&self) -> i64 {
        stock::units_from_packages(self.stock_quantity, self.units_per_item())
    }

    /// At or below its minimum stock threshold.
    pub fn is_low_stock(&self) -> bool {
        self.minimum_stock > 0 && self.stock_quantity <= self.minimum_stock
    }
}

// =============================================================================
// Synthesis
// =============================================================================

/// Knobs for synthesizing virtual variants from legacy products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisPolicy {
    /// Package size assumed when a legacy product is flagged as packaged but
    /// never recorded a size. `None` skips the package view instead.
    pub fallback_units_per_package: Option<i64>,
    /// Discount off the linear unit price for packages with no explicit price.
    pub package_discount_bps: u32,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        SynthesisPolicy {
            fallback_units_per_package: Some(DEFAULT_LEGACY_UNITS_PER_PACKAGE),
            package_discount_bps: DEFAULT_PACKAGE_DISCOUNT_BPS,
        }
    }
}

/// Variants synthesized from a legacy product's flat fields.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualVariants {
    pub unit: Option<ProductVariant>,
    pub package: Option<ProductVariant>,
    /// The package size came from [`SynthesisPolicy::fallback_units_per_package`].
    pub used_fallback_units: bool,
}

/// Builds read-only variants for a product that has no variant rows.
///
/// Deterministic: the same product fields and policy always give the same
/// variants (ids, stock split and prices).
///
/// ## Rules
/// - Unit view mirrors `price` and `stock_quantity`.
/// - A package view exists only if the product has package data
///   (`has_package_tracking`, `package_units > 1` or a `package_price`).
/// - Package stock is `floor(stock_quantity / units_per_package)`.
/// - Package price defaults to the discounted linear unit price.
///
/// ## Example
/// ```rust
/// use adega_core::variant::{synthesize_variants, SynthesisPolicy};
/// # use adega_core::types::Product;
/// # use chrono::Utc;
/// # let now = Utc::now();
/// # let product = Product {
/// #     id: "p1".into(), name: "Malbec".into(), category: None,
/// #     price_cents: 1000, cost_price_cents: None, barcode: None,
/// #     package_barcode: None, minimum_stock: 0, stock_quantity: 20,
/// #     package_units: Some(6), package_price_cents: None,
/// #     has_package_tracking: true, is_active: true,
/// #     created_at: now, updated_at: now,
/// # };
/// let virtuals = synthesize_variants(&product, &SynthesisPolicy::default());
/// assert_eq!(virtuals.unit.unwrap().stock_quantity, 20);
/// assert_eq!(virtuals.package.unwrap().stock_quantity, 3);
/// ```
pub fn synthesize_variants(product: &Product, policy: &SynthesisPolicy) -> VirtualVariants {
    let unit = ProductVariant {
        id: virtual_variant_id(&product.id, VariantType::Unit),
        product_id: product.id.clone(),
        variant_type: VariantType::Unit,
        stock_quantity: product.stock_quantity.max(0),
        units_in_package: None,
        price_cents: product.price_cents,
        cost_price_cents: product.cost_price_cents,
        barcode: product.barcode.clone(),
        minimum_stock: product.minimum_stock.max(0),
        is_active: true,
        created_at: product.created_at,
        updated_at: product.updated_at,
    };

    if !product.has_package_data() {
        return VirtualVariants {
            unit: Some(unit),
            package: None,
            used_fallback_units: false,
        };
    }

    let (units_per_package, used_fallback_units) = match product.package_units {
        Some(n) if n > 0 => (n, false),
        _ => match policy.fallback_units_per_package {
            Some(n) if n > 0 => (n, true),
            _ => {
                return VirtualVariants {
                    unit: Some(unit),
                    package: None,
                    used_fallback_units: false,
                }
            }
        },
    };

    let price_cents = product.package_price_cents.unwrap_or_else(|| {
        product
            .price()
            .multiply_quantity(units_per_package)
            .apply_percentage_discount(policy.package_discount_bps)
            .cents()
    });

    let (full_packages, _) = stock::package_breakdown(product.stock_quantity, units_per_package);
    let (minimum_packages, _) = stock::package_breakdown(product.minimum_stock, units_per_package);

    let package = ProductVariant {
        id: virtual_variant_id(&product.id, VariantType::Package),
        product_id: product.id.clone(),
        variant_type: VariantType::Package,
        stock_quantity: full_packages,
        units_in_package: Some(units_per_package),
        price_cents,
        cost_price_cents: product.cost_price_cents.map(|c| c * units_per_package),
        barcode: product.package_barcode.clone(),
        minimum_stock: minimum_packages,
        is_active: true,
        created_at: product.created_at,
        updated_at: product.updated_at,
    };

    VirtualVariants {
        unit: Some(unit),
        package: Some(package),
        used_fallback_units,
    }
}

/// Id given to a synthesized variant. Never stored.
pub fn virtual_variant_id(product_id: &str, variant_type: VariantType) -> String {
    format!("{}-{}-virtual", product_id, variant_type)
}

// =============================================================================
// Product With Variants
// =============================================================================

/// A product together with its (explicit or virtual) variants and the flags
/// derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductWithVariants {
    pub product: Product,
    pub unit_variant: Option<ProductVariant>,
    pub package_variant: Option<ProductVariant>,
    /// Variants were synthesized from legacy fields (no variant rows).
    pub is_virtual: bool,
    /// The package size is the configured fallback, not a recorded value.
    pub units_in_package_is_fallback: bool,
    pub total_stock_units: i64,
    pub has_both_variants: bool,
    /// For sales: the variant exists and has stock.
    pub can_sell_units: bool,
    pub can_sell_packages: bool,
    /// For adjustments: the variant exists, stock may be zero.
    pub can_adjust_units: bool,
    pub can_adjust_packages: bool,
}

impl ProductWithVariants {
    /// Combines a product with its variant rows.
    ///
    /// Inactive rows are ignored. With no active rows at all, virtual
    /// variants are synthesized using `policy`.
    pub fn assemble(product: Product, variants: Vec<ProductVariant>, policy: &SynthesisPolicy) -> Self {
        let mut unit_variant = None;
        let mut package_variant = None;

        for variant in variants.into_iter().filter(|v| v.is_active) {
            let slot = match variant.variant_type {
                VariantType::Unit => &mut unit_variant,
                VariantType::Package => &mut package_variant,
            };
            if slot.is_none() {
                *slot = Some(variant);
            }
        }

        let is_virtual = unit_variant.is_none() && package_variant.is_none();
        let mut units_in_package_is_fallback = false;

        let total_stock_units = if is_virtual {
            let virtuals = synthesize_variants(&product, policy);
            unit_variant = virtuals.unit;
            package_variant = virtuals.package;
            units_in_package_is_fallback = virtuals.used_fallback_units;
            product.stock_quantity.max(0)
        } else {
            stock::total_units(
                unit_variant.as_ref().map_or(0, |v| v.stock_quantity),
                package_variant.as_ref().map_or(0, |v| v.stock_quantity),
                package_variant.as_ref().map_or(0, |v| v.units_per_item()),
            )
        };

        ProductWithVariants {
            has_both_variants: unit_variant.is_some() && package_variant.is_some(),
            can_sell_units: unit_variant.as_ref().is_some_and(|v| v.stock_quantity > 0),
            can_sell_packages: package_variant.as_ref().is_some_and(|v| v.stock_quantity > 0),
            can_adjust_units: unit_variant.is_some(),
            can_adjust_packages: package_variant.is_some(),
            product,
            unit_variant,
            package_variant,
            is_virtual,
            units_in_package_is_fallback,
            total_stock_units,
        }
    }

    /// Product identifier.
    pub fn id(&self) -> &str {
        &self.product.id
    }

    /// The variant of the given type, if configured.
    pub fn variant(&self, variant_type: VariantType) -> Option<&ProductVariant> {
        match variant_type {
            VariantType::Unit => self.unit_variant.as_ref(),
            VariantType::Package => self.package_variant.as_ref(),
        }
    }

    /// Conversion factor of the package variant.
    pub fn units_in_package(&self) -> Option<i64> {
        self.package_variant
            .as_ref()
            .and_then(|v| v.units_in_package)
            .filter(|n| *n > 0)
    }

    /// Variants at or below their minimum stock.
    pub fn low_stock_variants(&self) -> Vec<&ProductVariant> {
        [self.unit_variant.as_ref(), self.package_variant.as_ref()]
            .into_iter()
            .flatten()
            .filter(|v| v.is_low_stock())
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn legacy_product(stock: i64, package_units: Option<i64>, tracking: bool) -> Product {
        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .map(|d| d.with_timezone(&Utc))
            .unwrap();
        Product {
            id: "prod-1".to_string(),
            name: "Malbec Reserva".to_string(),
            category: Some("Vinho Tinto".to_string()),
            price_cents: 1000,
            cost_price_cents: Some(600),
            barcode: Some("7790001".to_string()),
            package_barcode: Some("17790001".to_string()),
            minimum_stock: 12,
            stock_quantity: stock,
            package_units,
            package_price_cents: None,
            has_package_tracking: tracking,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn variant(
        product_id: &str,
        variant_type: VariantType,
        stock: i64,
        units_in_package: Option<i64>,
    ) -> ProductVariant {
        let now = Utc::now();
        ProductVariant {
            id: format!("{}-{}", product_id, variant_type),
            product_id: product_id.to_string(),
            variant_type,
            stock_quantity: stock,
            units_in_package,
            price_cents: match variant_type {
                VariantType::Unit => 1000,
                VariantType::Package => 5400,
            },
            cost_price_cents: None,
            barcode: None,
            minimum_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// unit=5, package=2 × 6
    pub(crate) fn explicit_product() -> ProductWithVariants {
        let product = legacy_product(17, Some(6), true);
        ProductWithVariants::assemble(
            product,
            vec![
                variant("prod-1", VariantType::Unit, 5, None),
                variant("prod-1", VariantType::Package, 2, Some(6)),
            ],
            &SynthesisPolicy::default(),
        )
    }

    #[test]
    fn test_variant_type_parsing() {
        assert_eq!("unit".parse::<VariantType>().unwrap(), VariantType::Unit);
        assert_eq!("Package".parse::<VariantType>().unwrap(), VariantType::Package);
        assert!("crate".parse::<VariantType>().is_err());
        assert_eq!(VariantType::Package.to_string(), "package");
    }

    #[test]
    fn test_synthesize_legacy_tracked_product() {
        let product = legacy_product(20, Some(6), true);
        let virtuals = synthesize_variants(&product, &SynthesisPolicy::default());

        let unit = virtuals.unit.unwrap();
        let package = virtuals.package.unwrap();
        assert_eq!(unit.stock_quantity, 20);
        assert_eq!(unit.price_cents, 1000);
        assert_eq!(package.stock_quantity, 3);
        assert_eq!(package.units_in_package, Some(6));
        // 1000 × 6 − 10%
        assert_eq!(package.price_cents, 5400);
        assert_eq!(package.cost_price_cents, Some(3600));
        assert_eq!(package.minimum_stock, 2);
        assert_eq!(package.barcode.as_deref(), Some("17790001"));
        assert!(!virtuals.used_fallback_units);
    }

    #[test]
    fn test_synthesize_prefers_explicit_package_price() {
        let mut product = legacy_product(20, Some(6), true);
        product.package_price_cents = Some(5000);
        let virtuals = synthesize_variants(&product, &SynthesisPolicy::default());
        assert_eq!(virtuals.package.unwrap().price_cents, 5000);
    }

    #[test]
    fn test_synthesize_without_package_data() {
        let product = legacy_product(20, None, false);
        let virtuals = synthesize_variants(&product, &SynthesisPolicy::default());
        assert!(virtuals.unit.is_some());
        assert!(virtuals.package.is_none());
    }

    #[test]
    fn test_synthesize_uses_fallback_size() {
        let product = legacy_product(20, None, true);
        let virtuals = synthesize_variants(&product, &SynthesisPolicy::default());
        assert!(virtuals.used_fallback_units);
        let package = virtuals.package.unwrap();
        assert_eq!(package.units_in_package, Some(6));
        assert_eq!(package.stock_quantity, 3);
    }

    #[test]
    fn test_synthesize_without_fallback_skips_package() {
        let product = legacy_product(20, None, true);
        let policy = SynthesisPolicy {
            fallback_units_per_package: None,
            ..SynthesisPolicy::default()
        };
        let virtuals = synthesize_variants(&product, &policy);
        assert!(virtuals.package.is_none());
        assert!(!virtuals.used_fallback_units);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let product = legacy_product(47, Some(12), true);
        let policy = SynthesisPolicy::default();
        assert_eq!(
            synthesize_variants(&product, &policy),
            synthesize_variants(&product, &policy)
        );
    }

    #[test]
    fn test_assemble_explicit_variants() {
        let pwv = explicit_product();
        assert!(!pwv.is_virtual);
        assert!(pwv.has_both_variants);
        assert_eq!(pwv.total_stock_units, 17);
        assert_eq!(pwv.units_in_package(), Some(6));
        assert!(pwv.can_sell_units && pwv.can_sell_packages);
    }

    #[test]
    fn test_assemble_virtual_total_is_legacy_pool() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(20, Some(6), true),
            vec![],
            &SynthesisPolicy::default(),
        );
        assert!(pwv.is_virtual);
        // 20, not 20 + 3 × 6
        assert_eq!(pwv.total_stock_units, 20);
        assert_eq!(pwv.package_variant.as_ref().unwrap().stock_quantity, 3);
    }

    #[test]
    fn test_assemble_ignores_inactive_rows() {
        let mut retired = variant("prod-1", VariantType::Package, 9, Some(6));
        retired.is_active = false;
        let pwv = ProductWithVariants::assemble(
            legacy_product(4, None, false),
            vec![variant("prod-1", VariantType::Unit, 4, None), retired],
            &SynthesisPolicy::default(),
        );
        assert!(!pwv.is_virtual);
        assert!(pwv.package_variant.is_none());
        assert!(!pwv.can_adjust_packages);
        assert_eq!(pwv.total_stock_units, 4);
    }

    #[test]
    fn test_flags_with_zero_stock() {
        let pwv = ProductWithVariants::assemble(
            legacy_product(0, Some(6), true),
            vec![
                variant("prod-1", VariantType::Unit, 0, None),
                variant("prod-1", VariantType::Package, 0, Some(6)),
            ],
            &SynthesisPolicy::default(),
        );
        assert!(!pwv.can_sell_units);
        assert!(!pwv.can_sell_packages);
        assert!(pwv.can_adjust_units);
        assert!(pwv.can_adjust_packages);
    }

    #[test]
    fn test_low_stock_variants() {
        let mut unit = variant("prod-1", VariantType::Unit, 3, None);
        unit.minimum_stock = 5;
        let pwv = ProductWithVariants::assemble(
            legacy_product(3, None, false),
            vec![unit],
            &SynthesisPolicy::default(),
        );
        assert_eq!(pwv.low_stock_variants().len(), 1);
    }
}
