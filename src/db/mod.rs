//! Database module: models, schema and the SQLite-backed storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL owned in one place
//! - `sqlite.rs`: pool setup and schema bootstrap
//! - `users.rs`, `products.rs`, `sales.rs`, `alerts.rs`, `reports.rs`: queries by area

pub mod alerts;
pub mod models;
pub mod products;
pub mod reports;
pub mod sales;
pub mod schema;
pub mod sqlite;
pub mod users;

pub use models::{
    AlertStatus, Category, DbProduct, DbTransaction, DbTransactionDetail, DbUser, LowStockItem,
    PaymentMethod, PaymentStatus, Role, StockAlert, StockStatus, UserProfile,
};
pub use schema::SQLITE_INIT;
pub use sqlite::{InventoryStorage, SqlitePool};

#[cfg(test)]
pub(crate) mod test_support {
    use super::InventoryStorage;
    use crate::config::StorageConfig;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    pub fn temp_path(tag: &str, ext: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!(
            "inventrack-{tag}-{}-{nanos}-{seq}.{ext}",
            std::process::id()
        ));
        path
    }

    pub async fn temp_storage(tag: &str) -> (InventoryStorage, PathBuf) {
        let path = temp_path(tag, "sqlite");
        let cfg = StorageConfig {
            database_url: format!("sqlite:{}", path.display()),
            ..StorageConfig::default()
        };
        let db = InventoryStorage::connect(&cfg, 5)
            .await
            .expect("open temp database");
        (db, path)
    }

    pub fn remove_db_files(path: &Path) {
        let _ = std::fs::remove_file(path);
        for suffix in ["-wal", "-shm"] {
            let mut side = path.as_os_str().to_owned();
            side.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(side));
        }
    }
}
