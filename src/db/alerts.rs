use chrono::NaiveDateTime;

use crate::db::models::{AlertStatus, StockAlert};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;

/// Counts touched by one alert reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertSync {
    pub opened: u64,
    pub resolved: u64,
}

impl InventoryStorage {
    /// Reconcile `stock_alerts` with current stock: resolve alerts whose product
    /// recovered, open one alert per low product that has none active.
    pub async fn sync_alerts(&self, now: NaiveDateTime) -> Result<AlertSync, InvenError> {
        let threshold = self.low_stock_threshold();
        let mut tx = self.pool().begin().await?;

        let resolved = sqlx::query(
            r#"UPDATE stock_alerts SET alert_status = ?, resolved_at = ?
               WHERE alert_status = ?
                 AND product_id IN (SELECT id FROM products WHERE stock_quantity > ?)"#,
        )
        .bind(AlertStatus::Resolved)
        .bind(now)
        .bind(AlertStatus::Active)
        .bind(threshold)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let opened = sqlx::query(
            r#"INSERT INTO stock_alerts (product_id, alert_status, created_at)
               SELECT p.id, ?, ? FROM products p
               WHERE p.stock_quantity <= ?
                 AND NOT EXISTS (
                     SELECT 1 FROM stock_alerts a
                     WHERE a.product_id = p.id AND a.alert_status = ?
                 )"#,
        )
        .bind(AlertStatus::Active)
        .bind(now)
        .bind(threshold)
        .bind(AlertStatus::Active)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(AlertSync { opened, resolved })
    }

    /// Alerts newest first, optionally narrowed to one status.
    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
    ) -> Result<Vec<StockAlert>, InvenError> {
        let rows = sqlx::query_as::<_, StockAlert>(
            r#"SELECT a.id, a.product_id, p.name AS product_name, p.stock_quantity,
                      a.alert_status, a.created_at, a.resolved_at
               FROM stock_alerts a
               JOIN products p ON p.id = a.product_id
               WHERE (? IS NULL OR a.alert_status = ?)
               ORDER BY a.created_at DESC, a.id DESC"#,
        )
        .bind(status)
        .bind(status)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
