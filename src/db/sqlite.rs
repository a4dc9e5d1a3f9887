use crate::config::StorageConfig;
use crate::db::schema::{DEFAULT_CATEGORIES, SCHEMA_VERSION, SQLITE_INIT};
use crate::error::InvenError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub type SqlitePool = Pool<Sqlite>;

/// Shared handle over the inventory database. Cheap to clone.
#[derive(Clone)]
pub struct InventoryStorage {
    pool: SqlitePool,
    low_stock_threshold: i64,
}

impl InventoryStorage {
    pub fn new(pool: SqlitePool, low_stock_threshold: i64) -> Self {
        Self {
            pool,
            low_stock_threshold,
        }
    }

    /// Open (creating if missing) the database, then bring the schema up.
    pub async fn connect(
        storage: &StorageConfig,
        low_stock_threshold: i64,
    ) -> Result<Self, InvenError> {
        let connect_opts = SqliteConnectOptions::from_str(storage.database_url.as_str())?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(storage.busy_timeout_secs))
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(storage.max_connections)
            .connect_with(connect_opts)
            .await?;

        let db = Self::new(pool, low_stock_threshold);
        db.init_schema().await?;
        info!(database_url = %storage.database_url, "inventory database ready");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn low_stock_threshold(&self) -> i64 {
        self.low_stock_threshold
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), InvenError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }

        let stored: Option<(String,)> =
            sqlx::query_as("SELECT value FROM meta WHERE key = 'schema_version'")
                .fetch_optional(&self.pool)
                .await?;
        match stored {
            Some((version,)) if version == SCHEMA_VERSION => {}
            Some((version,)) => {
                return Err(InvenError::Schema(format!(
                    "database schema version {version} does not match expected {SCHEMA_VERSION}"
                )));
            }
            None => {
                sqlx::query("INSERT INTO meta (key, value) VALUES ('schema_version', ?)")
                    .bind(SCHEMA_VERSION)
                    .execute(&self.pool)
                    .await?;
            }
        }

        let (categories,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        if categories == 0 {
            let mut tx = self.pool.begin().await?;
            for name in DEFAULT_CATEGORIES {
                sqlx::query("INSERT OR IGNORE INTO categories (name) VALUES (?)")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            debug!(count = DEFAULT_CATEGORIES.len(), "seeded default categories");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::{remove_db_files, temp_storage};

    #[tokio::test]
    async fn schema_init_is_idempotent_and_seeds_categories() {
        let (db, path) = temp_storage("schema").await;
        db.init_schema().await.expect("second init");

        let names: Vec<String> = db
            .list_categories()
            .await
            .expect("categories")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Electronics", "Furniture", "Sports", "Stationery"]);

        db.pool().close().await;
        remove_db_files(&path);
    }
}
