//! # adega-core: Pure Inventory Logic for Adega
//!
//! This crate is the **heart** of the Adega inventory engine. Every product's
//! stock can live as loose units or as sealed packages, and this crate holds
//! all the rules that keep those two representations consistent, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Adega Inventory Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Presentation (forms, tables, dashboards) - external      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ read/query results                     │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ adega-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌──────────────┐ ┌────────────┐     │   │
//! │  │   │  stock  │ │ variant  │ │ availability │ │ conversion │     │   │
//! │  │   │ math    │ │ model +  │ │   checker    │ │  planning  │     │   │
//! │  │   │         │ │ synthesis│ │              │ │            │     │   │
//! │  │   └─────────┘ └──────────┘ └──────────────┘ └────────────┘     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                adega-db (Database Layer)                        │   │
//! │  │      SQLite transactions, conversion log, movements, sales      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`stock`] - Package/unit arithmetic (breakdown and inverse)
//! - [`variant`] - Product variants and virtual variant synthesis
//! - [`availability`] - Can a request be fulfilled, and does it need a conversion?
//! - [`conversion`] - Conversion planning and the conversion log record
//! - [`adjustment`] - Manual stock adjustments and their previews
//! - [`types`] - Persisted records (Product, movements, sales)
//! - [`money`] - Integer money (cents)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## The Core Invariant
//!
//! ```text
//! total_stock_units = unit.stock_quantity + package.stock_quantity × units_in_package
//! ```
//!
//! Conversions reshuffle the split and never change this number. Only sales
//! and losses decrease it; only purchases and returns increase it.
//!
//! ## Example Usage
//!
//! ```rust
//! use adega_core::stock::{package_breakdown, units_from_packages};
//!
//! // 20 bottles, 6 to a case: 3 full cases and 2 loose bottles
//! assert_eq!(package_breakdown(20, 6), (3, 2));
//!
//! // And back again
//! assert_eq!(units_from_packages(3, 6) + 2, 20);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod adjustment;
pub mod availability;
pub mod conversion;
pub mod error;
pub mod money;
pub mod stock;
pub mod types;
pub mod validation;
pub mod variant;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use adjustment::{preview_adjustment, AdjustmentKind, AdjustmentPlan, StockPreview};
pub use availability::{check_availability, AvailabilityDecision};
pub use conversion::{ConversionDirection, ConversionPlan, ConversionType, InventoryConversionLog};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
pub use variant::{
    synthesize_variants, ProductVariant, ProductWithVariants, SynthesisPolicy, VariantType,
    VirtualVariants,
};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Units per package assumed for legacy products that never recorded one.
///
/// ## Heuristic, not a business rule
/// Older catalog rows flagged `has_package_tracking` without a package size.
/// The legacy screens assumed a 6-bottle case. Callers can override or
/// disable this through [`SynthesisPolicy`].
pub const DEFAULT_LEGACY_UNITS_PER_PACKAGE: i64 = 6;

/// Discount applied to the linear unit price when a synthesized package has
/// no explicit price, in basis points (1000 = 10%).
pub const DEFAULT_PACKAGE_DISCOUNT_BPS: u32 = 1000;

/// Maximum quantity accepted on a single sale line or adjustment.
///
/// ## Business Reason
/// Prevents accidental over-entry (typing 10000 instead of 100).
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Default number of conversion log rows returned by history queries.
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
