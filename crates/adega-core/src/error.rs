//! # Error Types
//!
//! Domain-specific error types for adega-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  adega-core errors (this file)                                         │
//! │  ├── CoreError        - Stock and configuration failures               │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  adega-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Families the Caller Must Not Conflate
//! - "Not enough stock" ([`CoreError::InsufficientStock`],
//!   [`CoreError::InsufficientStockForConversion`]) → operator restocks or
//!   reduces the quantity.
//! - "System error" (`DbError::StorageUnavailable`,
//!   `DbError::TransactionConflict`) → retry the whole operation.

use thiserror::Error;

use crate::conversion::ConversionDirection;
use crate::variant::VariantType;

// =============================================================================
// Core Error
// =============================================================================

/// Inventory domain errors.
///
/// Every variant here means "nothing was mutated": the engine validates and
/// plans before it writes.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity is zero or negative.
    ///
    /// Rejected before touching storage.
    #[error("Invalid quantity {quantity}: must be a positive integer")]
    InvalidQuantity { quantity: i64 },

    /// The product has no variant of the requested type.
    ///
    /// ## When This Occurs
    /// - Selling packages of a product only stocked as units
    /// - Converting stock on a product with no explicit variants
    ///
    /// This is a configuration gap, not a stock shortage.
    #[error("Product {product_id} has no {variant_type} variant configured")]
    VariantNotConfigured {
        product_id: String,
        variant_type: VariantType,
    },

    /// Not enough stock to fulfil the request, even with a conversion.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 3 cases
    ///      │
    ///      ▼
    /// package stock = 2
    ///      │
    ///      ▼
    /// InsufficientStock { variant_type: package, available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// UI shows: "Only 2 cases in stock"
    /// ```
    #[error(
        "Insufficient {variant_type} stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        variant_type: VariantType,
        available: i64,
        requested: i64,
    },

    /// Conversion source does not hold enough stock.
    #[error(
        "Insufficient stock to convert ({direction}) for product {product_id}: source has {available}, needs {required}"
    )]
    InsufficientStockForConversion {
        product_id: String,
        direction: ConversionDirection,
        available: i64,
        required: i64,
    },

    /// Conversion request is malformed (e.g. package without a size).
    #[error("Invalid conversion for product {product_id}: {reason}")]
    InvalidConversion { product_id: String, reason: String },

    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for the "not enough stock" family.
    ///
    /// The presentation layer uses this to tell "restock" apart from
    /// "system error, retry".
    pub fn is_stock_shortage(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientStock { .. } | CoreError::InsufficientStockForConversion { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Unparseable value, such as an unknown enum string.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p1".to_string(),
            variant_type: VariantType::Package,
            available: 2,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient package stock for product p1: available 2, requested 3"
        );

        let err = CoreError::InsufficientStockForConversion {
            product_id: "p1".to_string(),
            direction: ConversionDirection::PackageToUnits,
            available: 1,
            required: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock to convert (package_to_units) for product p1: source has 1, needs 2"
        );
    }

    #[test]
    fn test_stock_shortage_family() {
        assert!(CoreError::InsufficientStock {
            product_id: "p".into(),
            variant_type: VariantType::Unit,
            available: 0,
            requested: 1,
        }
        .is_stock_shortage());

        assert!(!CoreError::InvalidQuantity { quantity: 0 }.is_stock_shortage());
        assert!(!CoreError::VariantNotConfigured {
            product_id: "p".into(),
            variant_type: VariantType::Package,
        }
        .is_stock_shortage());
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
