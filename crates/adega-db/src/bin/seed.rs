//! # Seed Data Generator
//!
//! Populates a database with demo products covering every stock mode.
//!
//! ## Usage
//! ```bash
//! # Database from adega.toml / ADEGA_DB_PATH
//! cargo run -p adega-db --bin seed
//!
//! # Specify database path
//! cargo run -p adega-db --bin seed -- --db ./data/adega.db
//!
//! # Use a specific config file
//! cargo run -p adega-db --bin seed -- --config ./adega.toml
//! ```
//!
//! ## Generated Products
//! - Explicit unit + package variants (beer cans and long necks)
//! - Legacy flat stock with a recorded case size (wine)
//! - Legacy flat stock flagged as packaged without a size (fallback size)
//! - Unit-only legacy products (spirits)
//!
//! Each explicit product is then sold once by units, so the conversion log
//! and movement ledger have something to show.

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use adega_core::{NewSale, Product, SaleLineRequest, VariantType};
use adega_db::{AdegaConfig, Database, StockAudit};

/// (name, category, unit price cents, stock in units, case size)
const EXPLICIT: &[(&str, &str, i64, i64, i64)] = &[
    ("Skol Lata 350ml", "Cerveja", 399, 100, 12),
    ("Brahma Duplo Malte 350ml", "Cerveja", 449, 76, 12),
    ("Heineken Long Neck 330ml", "Cerveja", 799, 50, 6),
    ("Corona Extra 355ml", "Cerveja", 899, 27, 6),
];

const LEGACY_PACKAGED: &[(&str, &str, i64, i64, Option<i64>)] = &[
    ("Casillero del Diablo Cabernet", "Vinho Tinto", 6990, 20, Some(6)),
    ("Miolo Seleção Chardonnay", "Vinho Branco", 5490, 14, Some(6)),
    ("Catena Malbec", "Vinho Tinto", 11990, 9, None),
];

const UNIT_ONLY: &[(&str, &str, i64, i64)] = &[
    ("Absolut Vodka 1L", "Destilado", 10990, 8),
    ("Johnnie Walker Red Label 1L", "Destilado", 13990, 5),
    ("Ypióca Prata 965ml", "Cachaça", 2990, 15),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Adega Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = AdegaConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    info!(path = %config.database.path.display(), "Seeding database");
    let db = Database::from_config(&config).await?;

    let existing = db.products().list_active(1).await?;
    if !existing.is_empty() {
        warn!("Database already has products; skipping seed to avoid duplicates");
        return Ok(());
    }

    let inventory = db.inventory();
    let owner = StockAudit::by("seed").with_reason("initial stock");

    let mut explicit_ids = Vec::new();
    for (name, category, price_cents, stock, case_size) in EXPLICIT {
        let product = new_product(name, category, *price_cents, *stock, None, false);
        db.products().insert(&product).await?;
        inventory
            .enable_package_tracking(&product.id, *case_size, None, &owner)
            .await?;
        explicit_ids.push(product.id);
    }

    for (name, category, price_cents, stock, case_size) in LEGACY_PACKAGED {
        let product = new_product(name, category, *price_cents, *stock, *case_size, true);
        db.products().insert(&product).await?;
    }

    for (name, category, price_cents, stock) in UNIT_ONLY {
        let product = new_product(name, category, *price_cents, *stock, None, false);
        db.products().insert(&product).await?;
    }

    info!(
        explicit = EXPLICIT.len(),
        legacy_packaged = LEGACY_PACKAGED.len(),
        unit_only = UNIT_ONLY.len(),
        "Products created"
    );

    // One unit sale per explicit product; large enough to open a case when
    // the loose units run short.
    for product_id in &explicit_ids {
        let product = inventory.load_product_with_variants(product_id).await?;
        let loose = product.unit_variant.as_ref().map_or(0, |v| v.stock_quantity);

        let receipt = db
            .checkout()
            .record_sale(NewSale {
                user_id: "seed".to_string(),
                notes: Some("demo sale".to_string()),
                lines: vec![SaleLineRequest {
                    product_id: product_id.clone(),
                    variant_type: VariantType::Unit,
                    quantity: loose + 1,
                }],
            })
            .await?;

        info!(
            receipt = %receipt.sale.receipt_number,
            product = %product.product.name,
            conversions = receipt.conversions.len(),
            total = %receipt.total(),
            "Demo sale recorded"
        );
    }

    for product in db.products().list_active(100).await? {
        let loaded = inventory.load_product_with_variants(&product.id).await?;
        println!(
            "{:<32} units={:<4} packages={:<4} total={:<4}{}",
            loaded.product.name,
            loaded.unit_variant.as_ref().map_or(0, |v| v.stock_quantity),
            loaded.package_variant.as_ref().map_or(0, |v| v.stock_quantity),
            loaded.total_stock_units,
            if loaded.is_virtual { " (legacy)" } else { "" },
        );
    }

    db.close().await;
    Ok(())
}

/// Log filter from `RUST_LOG`, falling back to debug for our crates.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,adega=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn new_product(
    name: &str,
    category: &str,
    price_cents: i64,
    stock: i64,
    package_units: Option<i64>,
    has_package_tracking: bool,
) -> Product {
    let now = Utc::now();
    let code: String = Uuid::new_v4().simple().to_string().chars().take(10).collect();

    Product {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        category: Some(category.to_string()),
        price_cents,
        cost_price_cents: Some(price_cents * 6 / 10),
        barcode: Some(format!("789{}", code)),
        package_barcode: package_units.map(|_| format!("1789{}", code)),
        minimum_stock: 6,
        stock_quantity: stock,
        package_units,
        package_price_cents: None,
        has_package_tracking,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
