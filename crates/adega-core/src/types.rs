//! # Domain Types
//!
//! Persisted records around the variant model.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────────┐  │
//! │  │    Product      │──►│  ProductVariant  │   │ InventoryMovement   │  │
//! │  │  (legacy flat   │   │  (variant.rs)    │   │  ledger of every    │  │
//! │  │   stock fields) │   │  unit | package  │   │  stock change       │  │
//! │  └─────────────────┘   └──────────────────┘   └─────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌─────────────────────┐  │
//! │  │      Sale       │──►│    SaleItem      │   │ InventoryConversion │  │
//! │  │                 │   │  variant + price │   │ Log (conversion.rs) │  │
//! │  └─────────────────┘   └──────────────────┘   └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity uses a UUID v4 string as its `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::variant::VariantType;

// =============================================================================
// Product
// =============================================================================

/// A catalog entry.
///
/// `stock_quantity`, `package_units` and `package_price_cents` are the legacy
/// flat fields. For products with explicit variants `stock_quantity` mirrors
/// the total unit count so older readers stay correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    /// Unit price in cents.
    pub price_cents: i64,
    pub cost_price_cents: Option<i64>,
    pub barcode: Option<String>,
    pub package_barcode: Option<String>,
    /// Low-stock threshold in units.
    pub minimum_stock: i64,
    /// Legacy flat stock, in units.
    pub stock_quantity: i64,
    /// Legacy package size.
    pub package_units: Option<i64>,
    /// Legacy package price in cents.
    pub package_price_cents: Option<i64>,
    pub has_package_tracking: bool,
    /// Soft delete flag.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Legacy fields describe a package representation.
    pub fn has_package_data(&self) -> bool {
        self.has_package_tracking
            || self.package_units.is_some_and(|n| n > 1)
            || self.package_price_cents.is_some()
    }
}

// =============================================================================
// Movements
// =============================================================================

/// Kind of stock-affecting event recorded in the movement ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Units sold to a customer.
    Sale,
    /// Stock received from a supplier.
    Purchase,
    /// Customer return put back on the shelf.
    Return,
    /// Manual exit or count correction.
    InventoryAdjustment,
    /// Breakage, theft, spoilage.
    Loss,
    /// Stock-neutral reshuffle between packages and units.
    Conversion,
    /// First count when a product starts tracking variants.
    InitialStock,
}

impl MovementType {
    /// Increases or decreases total units (conversions do neither).
    pub fn direction(&self) -> i64 {
        match self {
            MovementType::Purchase | MovementType::Return | MovementType::InitialStock => 1,
            MovementType::Sale | MovementType::Loss => -1,
            MovementType::InventoryAdjustment | MovementType::Conversion => 0,
        }
    }
}

/// One ledger entry in `inventory_movements`.
///
/// `variant_id` is `None` when the legacy flat stock was moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub variant_type: Option<VariantType>,
    pub movement_type: MovementType,
    /// Signed change, in the moved variant's own unit.
    pub quantity_change: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: Option<String>,
    pub user_id: Option<String>,
    pub sale_id: Option<String>,
    pub conversion_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales
// =============================================================================

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub user_id: String,
    pub total_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sale line. Uses the snapshot pattern: name and price are frozen at the
/// time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// `None` when sold from a legacy product's flat stock.
    pub variant_id: Option<String>,
    pub variant_type: VariantType,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    /// Quantity in the sold variant's own unit.
    pub quantity: i64,
    /// Quantity expressed in units (quantity × units per item).
    pub units_deducted: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A requested sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub variant_type: VariantType,
    pub quantity: i64,
}

/// A sale to record atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    /// Cashier identity, supplied by the caller's auth layer.
    pub user_id: String,
    pub notes: Option<String>,
    pub lines: Vec<SaleLineRequest>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::tests::legacy_product;

    #[test]
    fn test_has_package_data() {
        assert!(legacy_product(10, None, true).has_package_data());
        assert!(legacy_product(10, Some(12), false).has_package_data());
        assert!(!legacy_product(10, Some(1), false).has_package_data());
        assert!(!legacy_product(10, None, false).has_package_data());

        let mut priced = legacy_product(10, None, false);
        priced.package_price_cents = Some(5000);
        assert!(priced.has_package_data());
    }

    #[test]
    fn test_movement_direction() {
        assert_eq!(MovementType::Sale.direction(), -1);
        assert_eq!(MovementType::Purchase.direction(), 1);
        assert_eq!(MovementType::Conversion.direction(), 0);
    }

    #[test]
    fn test_movement_type_serializes_snake_case() {
        let json = serde_json::to_string(&MovementType::InventoryAdjustment).unwrap();
        assert_eq!(json, "\"inventory_adjustment\"");
    }
}
