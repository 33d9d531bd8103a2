//! # Service Module
//!
//! Stock-changing operations that span several tables and must land
//! together.
//!
//! - [`stock_tx`] - [`StockTransaction`](stock_tx::StockTransaction), the unit
//!   of work every stock mutation runs in
//! - [`inventory`] - Availability, conversions, adjustments, package tracking
//! - [`checkout`] - Multi-line sales with automatic package opening

pub mod checkout;
pub mod inventory;
pub mod stock_tx;
