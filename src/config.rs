use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Process-wide configuration: defaults, then `config.toml`, then `INVENTRACK_*` env vars.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::load);

const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "INVENTRACK_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub listen_port: u16,
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 5000,
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
    /// Shared per-user cart document.
    pub cart_path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:inventrack.db".to_string(),
            cart_path: PathBuf::from("cart.json"),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Stock at or below this is "Low Stock" and raises an alert.
    pub low_stock_threshold: i64,
    /// 600 = 6 %.
    pub tax_rate_basis_points: i64,
    pub barcode_length: usize,
    pub currency: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 5,
            tax_rate_basis_points: 600,
            barcode_length: 12,
            currency: "RM".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub enabled: bool,
    /// Scan outcomes retained per user until drained.
    pub queue_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub storage: StorageConfig,
    pub inventory: InventoryConfig,
    pub scanner: ScannerConfig,
}

impl Config {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

    pub fn load() -> Self {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    /// Extract from an arbitrary figment; on error fall back to defaults.
    pub fn from_figment(figment: Figment) -> Self {
        // The subscriber is not installed yet when the config loads, so report on stderr.
        let mut config: Config = figment.extract().unwrap_or_else(|err| {
            eprintln!("Could not load configuration: {err}. Using default configuration.");
            Config::default()
        });
        config.ensure_valid();
        config
    }

    fn ensure_valid(&mut self) {
        let original = self.basic.loglevel.clone();
        self.basic.loglevel = self.basic.loglevel.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.basic.loglevel.as_str()) {
            eprintln!("Config error: loglevel of '{original}' is invalid - using default of 'info'");
            self.basic.loglevel = "info".to_string();
        }

        let defaults = InventoryConfig::default();
        if self.inventory.low_stock_threshold < 0 {
            eprintln!(
                "Config error: low_stock_threshold of {} is negative - using default of {}",
                self.inventory.low_stock_threshold, defaults.low_stock_threshold
            );
            self.inventory.low_stock_threshold = defaults.low_stock_threshold;
        }
        if !(0..=10_000).contains(&self.inventory.tax_rate_basis_points) {
            eprintln!(
                "Config error: tax_rate_basis_points of {} is out of range - using default of {}",
                self.inventory.tax_rate_basis_points, defaults.tax_rate_basis_points
            );
            self.inventory.tax_rate_basis_points = defaults.tax_rate_basis_points;
        }
        if !(6..=32).contains(&self.inventory.barcode_length) {
            eprintln!(
                "Config error: barcode_length of {} is out of range - using default of {}",
                self.inventory.barcode_length, defaults.barcode_length
            );
            self.inventory.barcode_length = defaults.barcode_length;
        }

        self.storage.max_connections = self.storage.max_connections.max(1);
        self.scanner.queue_capacity = self.scanner.queue_capacity.max(1);
    }
}
