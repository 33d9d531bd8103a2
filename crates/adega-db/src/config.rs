//! # Configuration
//!
//! Runtime settings for the inventory engine.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults            AdegaConfig::default()                          │
//! │  2. Config file         explicit path, or <config dir>/adega.toml       │
//! │  3. Environment         ADEGA_DB_PATH, ADEGA_DB_MAX_CONNECTIONS,        │
//! │                         ADEGA_DB_BUSY_TIMEOUT_MS,                       │
//! │                         ADEGA_LEGACY_UNITS_PER_PACKAGE,                 │
//! │                         ADEGA_PACKAGE_DISCOUNT_BPS                      │
//! │  4. validate()                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example File
//! ```toml
//! [database]
//! path = "/var/lib/adega/adega.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [inventory]
//! # Assumed case size for legacy products flagged as packaged without a
//! # recorded size. 0 skips synthesizing those packages.
//! legacy_units_per_package = 6
//! legacy_package_discount_bps = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use adega_core::validation::{validate_discount_bps, validate_units_in_package};
use adega_core::{SynthesisPolicy, DEFAULT_LEGACY_UNITS_PER_PACKAGE, DEFAULT_PACKAGE_DISCOUNT_BPS};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `<data dir>/adega.db`.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Wait for a free pooled connection (seconds).
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Wait for another writer's lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "adega", "inventory")
        .map(|dirs| dirs.data_dir().join("adega.db"))
        .unwrap_or_else(|| PathBuf::from("adega.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Inventory Settings
// =============================================================================

/// `[inventory]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Package size assumed for legacy products that never recorded one.
    /// `None` or `0` disables the assumption.
    #[serde(default = "default_legacy_units")]
    pub legacy_units_per_package: Option<i64>,

    /// Discount for synthesized package prices, in basis points.
    #[serde(default = "default_discount_bps")]
    pub legacy_package_discount_bps: u32,
}

fn default_legacy_units() -> Option<i64> {
    Some(DEFAULT_LEGACY_UNITS_PER_PACKAGE)
}

fn default_discount_bps() -> u32 {
    DEFAULT_PACKAGE_DISCOUNT_BPS
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            legacy_units_per_package: default_legacy_units(),
            legacy_package_discount_bps: default_discount_bps(),
        }
    }
}

impl InventorySettings {
    /// Synthesis knobs for the pure core.
    pub fn synthesis_policy(&self) -> SynthesisPolicy {
        SynthesisPolicy {
            fallback_units_per_package: self.legacy_units_per_package.filter(|n| *n > 0),
            package_discount_bps: self.legacy_package_discount_bps,
        }
    }
}

// =============================================================================
// Root Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdegaConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub inventory: InventorySettings,
}

impl AdegaConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml(contents: &str) -> DbResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        if let Some(units) = self.inventory.legacy_units_per_package.filter(|n| *n != 0) {
            validate_units_in_package(units)
                .map_err(|e| DbError::InvalidConfig(format!("legacy_units_per_package: {}", e)))?;
        }

        validate_discount_bps(self.inventory.legacy_package_discount_bps)
            .map_err(|e| DbError::InvalidConfig(e.to_string()))?;

        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::InvalidConfig(
                "min_connections cannot exceed max_connections".into(),
            ));
        }

        Ok(())
    }

    /// Pool settings derived from `[database]`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    /// Synthesis knobs derived from `[inventory]`.
    pub fn synthesis_policy(&self) -> SynthesisPolicy {
        self.inventory.synthesis_policy()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("ADEGA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("ADEGA_DB_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse::<u32>() {
                self.database.max_connections = n;
            }
        }

        if let Ok(ms) = std::env::var("ADEGA_DB_BUSY_TIMEOUT_MS") {
            if let Ok(n) = ms.parse::<u64>() {
                self.database.busy_timeout_ms = n;
            }
        }

        // "none" or "off" disables the fallback package size
        if let Ok(units) = std::env::var("ADEGA_LEGACY_UNITS_PER_PACKAGE") {
            match units.trim().to_lowercase().as_str() {
                "none" | "off" | "" => self.inventory.legacy_units_per_package = None,
                other => match other.parse::<i64>() {
                    Ok(n) => self.inventory.legacy_units_per_package = Some(n),
                    Err(_) => warn!(value = %units, "Ignoring invalid ADEGA_LEGACY_UNITS_PER_PACKAGE"),
                },
            }
        }

        if let Ok(bps) = std::env::var("ADEGA_PACKAGE_DISCOUNT_BPS") {
            if let Ok(n) = bps.parse::<u32>() {
                self.inventory.legacy_package_discount_bps = n;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "adega", "inventory")
            .map(|dirs| dirs.config_dir().join("adega.toml"))
    }
}
