//! # Database Handle
//!
//! Opens the SQLite file, applies the pragmas the stock engine relies on and
//! hands out repositories and services that share one pool.
//!
//! ## Writers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AdegaConfig::load() ─► db_config() ─► Database::new(config)            │
//! │                                              │                          │
//! │                   ┌──────────────────────────┴──────────────┐           │
//! │                   ▼                                         ▼           │
//! │        reads (load, history, low stock)        stock transactions       │
//! │        any pooled connection, WAL snapshot     one writer at a time     │
//! │                                                 │                       │
//! │                                                 ├─ lock acquired: run   │
//! │                                                 └─ busy_timeout spent:  │
//! │                                                    StorageUnavailable   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use adega_core::SynthesisPolicy;

use crate::config::AdegaConfig;
use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::{
    conversion::ConversionLogRepository, movement::MovementRepository, product::ProductRepository,
    sale::SaleRepository, variant::VariantRepository,
};
use crate::service::checkout::CheckoutService;
use crate::service::inventory::InventoryService;
use crate::service::stock_tx::StockTransaction;

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for [`Database::new`].
///
/// Usually built from `[database]` in `adega.toml` via
/// [`AdegaConfig::db_config`].
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/adega/adega.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Wait for a free pooled connection.
    pub connect_timeout: Duration,
    /// Wait for another writer's lock before giving up.
    pub busy_timeout: Duration,
    pub idle_timeout: Duration,
    /// Apply embedded migrations when the pool opens.
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed database; created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Private `:memory:` database for tests.
    ///
    /// Single connection: every connection to `:memory:` is its own database.
    /// Do not acquire a second connection while a transaction is open.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(":memory:")
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}?mode=rwc", self.database_path.display());

        Ok(SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
            .create_if_missing(true))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Pool plus the legacy synthesis policy every service assembles products
/// with. Clones share the pool.
///
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./adega.db")).await?;
///
/// let product = db.inventory().load_product_with_variants(&id).await?;
/// let receipt = db.checkout().record_sale(new_sale).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    policy: SynthesisPolicy,
}

impl Database {
    /// Opens the pool (WAL, foreign keys, busy timeout) and migrates.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening inventory database");

        let options = config.connect_options()?;
        debug!(busy_timeout_ms = config.busy_timeout.as_millis() as u64, "SQLite options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database {
            pool,
            policy: SynthesisPolicy::default(),
        };
        if config.run_migrations {
            db.run_migrations().await?;
        }

        info!(max_connections = config.max_connections, "Inventory database ready");
        Ok(db)
    }

    /// Opens the database described by a loaded [`AdegaConfig`].
    pub async fn from_config(config: &AdegaConfig) -> DbResult<Self> {
        Ok(Self::new(config.db_config())
            .await?
            .with_policy(config.synthesis_policy()))
    }

    /// Replaces the legacy synthesis policy.
    pub fn with_policy(mut self, policy: SynthesisPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Synthesis policy used when assembling products.
    pub fn policy(&self) -> &SynthesisPolicy {
        &self.policy
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn variants(&self) -> VariantRepository {
        VariantRepository::new(self.pool.clone())
    }

    /// Conversion audit log (read only from outside the crate).
    pub fn conversions(&self) -> ConversionLogRepository {
        ConversionLogRepository::new(self.pool.clone())
    }

    pub fn movements(&self) -> MovementRepository {
        MovementRepository::new(self.pool.clone())
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.pool.clone())
    }

    /// Returns the inventory service (availability, conversions, adjustments).
    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.pool.clone(), self.policy)
    }

    /// Returns the checkout service (atomic multi-line sales).
    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.pool.clone(), self.policy)
    }

    /// Opens a stock transaction for composing several operations.
    pub async fn begin_stock_transaction(&self) -> DbResult<StockTransaction> {
        StockTransaction::begin(&self.pool, self.policy).await
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        info!("Closing inventory database");
        self.pool.close().await;
    }

    /// `true` when a trivial query round-trips.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_opens_migrated_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
        assert_eq!(db.policy(), &SynthesisPolicy::default());
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[test]
    fn test_in_memory_is_single_connection() {
        let config = DbConfig::in_memory().busy_timeout(Duration::from_millis(200));

        assert_eq!(config.max_connections, 1);
        assert_eq!(config.busy_timeout, Duration::from_millis(200));
        assert!(config.run_migrations);
        assert_eq!(config.database_path, PathBuf::from(":memory:"));
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let result = sqlx::query(
            "INSERT INTO product_variants (id, product_id, variant_type, created_at, updated_at)
             VALUES ('v1', 'missing', 'unit', '2025-01-01T00:00:00Z', '2025-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await;

        assert!(matches!(
            result.map_err(DbError::from),
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }
}
