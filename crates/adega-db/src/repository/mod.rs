//! # Repository Module
//!
//! Table-level access for the inventory schema.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.products().get_by_id(id)        pool-backed repository methods     │
//! │       │                             (reads, catalog setup)             │
//! │       ▼                                                                 │
//! │  SqlitePool                                                            │
//! │                                                                         │
//! │  product::touch(&mut conn, id)      pub(crate) free functions taking   │
//! │  variant::decrement_stock(...)      &mut SqliteConnection, called by   │
//! │  conversion::append(...)            StockTransaction so every write    │
//! │       │                             lands in one transaction           │
//! │       ▼                                                                 │
//! │  Transaction<'static, Sqlite>                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog rows and legacy flat stock
//! - [`VariantRepository`](variant::VariantRepository) - Unit/package variants
//! - [`ConversionLogRepository`](conversion::ConversionLogRepository) - Append-only conversion audit
//! - [`MovementRepository`](movement::MovementRepository) - Stock movement ledger
//! - [`SaleRepository`](sale::SaleRepository) - Sales and sale items

pub mod conversion;
pub mod movement;
pub mod product;
pub mod sale;
pub mod variant;
