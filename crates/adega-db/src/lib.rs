//! # adega-db: Database Layer for Adega
//!
//! SQLite persistence for the inventory engine, and the transactional
//! operations that change stock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Adega Data Flow                                  │
//! │                                                                         │
//! │  Caller (POS screen, stock screen, import job)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     adega-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌──────────────┐    │   │
//! │  │   │   Services    │   │ StockTransaction│   │ Repositories │    │   │
//! │  │   │ inventory()   │──►│ lock → check → │──►│ product      │    │   │
//! │  │   │ checkout()    │   │ convert →      │   │ variant      │    │   │
//! │  │   │               │   │ decrement →    │   │ conversion   │    │   │
//! │  │   │               │   │ ledger, commit │   │ movement     │    │   │
//! │  │   └───────────────┘   └────────────────┘   │ sale         │    │   │
//! │  │                                             └──────────────┘    │   │
//! │  │   rules come from adega-core (pure)                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   products, product_variants, inventory_conversion_log,         │   │
//! │  │   inventory_movements, sales, sale_items                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `adega.toml` + environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Table access (product, variant, conversion log, movements, sales)
//! - [`service`] - Stock transactions, inventory operations, checkout
//!
//! ## Usage
//!
//! ```rust,ignore
//! use adega_db::{AdegaConfig, Database, StockAudit};
//! use adega_core::{ConversionDirection, VariantType};
//!
//! let config = AdegaConfig::load(None)?;
//! let db = Database::from_config(&config).await?;
//!
//! let decision = db
//!     .inventory()
//!     .check_variant_availability(&product_id, VariantType::Unit, 10)
//!     .await?;
//!
//! db.inventory()
//!     .convert_stock(&product_id, ConversionDirection::PackageToUnits, 1, &StockAudit::by(user_id))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::AdegaConfig;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::conversion::ConversionLogRepository;
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::variant::VariantRepository;

// Services
pub use service::checkout::{CheckoutService, SaleReceipt};
pub use service::inventory::InventoryService;
pub use service::stock_tx::{LineFulfillment, StockAudit, StockDecrement, StockTransaction};
