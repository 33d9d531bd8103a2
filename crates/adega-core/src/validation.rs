//! # Validation Module
//!
//! Input validation for inventory requests.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (forms, API handlers)                                 │
//! │  └── Deserialization, basic shape                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: adega-core                                                   │
//! │  └── THIS MODULE: quantities, package sizes, prices, ids               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (stock_quantity >= 0)                                       │
//! │  ├── Partial UNIQUE (one active variant per type)                      │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use adega_core::validation::{validate_quantity, validate_units_in_package};
//!
//! validate_quantity(5).unwrap();
//! validate_units_in_package(12).unwrap();
//! ```

use crate::error::ValidationError;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest package size accepted (a pallet of cans, not a typo).
pub const MAX_UNITS_IN_PACKAGE: i64 = 1_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use adega_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Malbec Reserva 750ml").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a free-text reason attached to a conversion or adjustment.
///
/// Empty reasons become `None`.
pub fn normalize_reason(reason: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    if reason.chars().count() > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
        });
    }

    Ok(Some(reason.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale or adjustment quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
///
/// Stock-facing entry points reject `<= 0` with
/// `CoreError::InvalidQuantity` before calling this.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a package size.
///
/// ## Example
/// ```rust
/// use adega_core::validation::validate_units_in_package;
///
/// assert!(validate_units_in_package(6).is_ok());
/// assert!(validate_units_in_package(0).is_err());
/// ```
pub fn validate_units_in_package(units: i64) -> ValidationResult<()> {
    if units <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "units_in_package".to_string(),
        });
    }

    if units > MAX_UNITS_IN_PACKAGE {
        return Err(ValidationError::OutOfRange {
            field: "units_in_package".to_string(),
            min: 1,
            max: MAX_UNITS_IN_PACKAGE,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (giveaways).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a discount in basis points (0 to 10000).
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "package_discount_bps".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}


// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Cerveja Pilsen Lata 350ml").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_normalize_reason() {
        assert_eq!(normalize_reason(None).unwrap(), None);
        assert_eq!(normalize_reason(Some("   ")).unwrap(), None);
        assert_eq!(
            normalize_reason(Some(" broken bottle ")).unwrap().as_deref(),
            Some("broken bottle")
        );
        assert!(normalize_reason(Some(&"x".repeat(501))).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_units_in_package() {
        assert!(validate_units_in_package(1).is_ok());
        assert!(validate_units_in_package(24).is_ok());
        assert!(validate_units_in_package(0).is_err());
        assert!(validate_units_in_package(-6).is_err());
        assert!(validate_units_in_package(MAX_UNITS_IN_PACKAGE + 1).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(1099).is_ok());
        assert!(validate_price_cents(-100).is_err());
    }

    #[test]
    fn test_validate_discount_bps() {
        assert!(validate_discount_bps(0).is_ok());
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_discount_bps(10_001).is_err());
    }
}
