//! Read-only sales analytics. Every query counts all recorded transactions,
//! paid or pending.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use crate::db::models::{PaymentMethod, PaymentStatus};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::types::{Cents, PeriodBounds, TrendGranularity};

/// Products listed by the stock forecast.
pub const FORECAST_LIMIT: i64 = 15;
/// Sales window averaged by the stock forecast.
pub const FORECAST_WINDOW_DAYS: u64 = 30;
pub const RECENT_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub transactions: i64,
    pub revenue_cents: Cents,
    pub average_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TransactionRow {
    pub id: i64,
    pub created_at: NaiveDateTime,
    pub cashier: String,
    pub total_cents: Cents,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

impl HistoryFilter {
    fn is_filtered(&self) -> bool {
        self.id.is_some() || self.from.is_some() || self.to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TrendPoint {
    pub bucket: String,
    pub revenue_cents: Cents,
    pub units: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ProductSales {
    pub product_name: String,
    pub units: i64,
    pub revenue_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CategorySales {
    pub category: String,
    pub units: i64,
    pub revenue_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockForecast {
    pub product_id: i64,
    pub product_name: String,
    pub stock_quantity: i64,
    pub avg_daily_units: f64,
    /// `None` when nothing sold in the window.
    pub days_to_stockout: Option<f64>,
}

fn push_bounds(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, bounds: PeriodBounds) {
    if let Some(start) = bounds.start {
        qb.push(format!(" AND {column} >= ")).push_bind(start);
    }
    if let Some(end) = bounds.end {
        qb.push(format!(" AND {column} < ")).push_bind(end);
    }
}

impl InventoryStorage {
    pub async fn sales_summary(&self, bounds: PeriodBounds) -> Result<SalesSummary, InvenError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*), COALESCE(SUM(total_cents), 0) FROM transactions WHERE 1 = 1",
        );
        push_bounds(&mut qb, "created_at", bounds);
        let (transactions, revenue): (i64, i64) =
            qb.build_query_as().fetch_one(self.pool()).await?;
        let revenue_cents = Cents(revenue);
        Ok(SalesSummary {
            transactions,
            revenue_cents,
            average_cents: revenue_cents.average(transactions),
        })
    }

    /// Newest first. Without a filter at most `limit` rows are returned; with
    /// one, every match is.
    pub async fn transaction_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionRow>, InvenError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"SELECT t.id, t.created_at, COALESCE(u.username, '(deleted)') AS cashier,
                      t.total_cents, t.payment_status, t.payment_method
               FROM transactions t
               LEFT JOIN users u ON u.id = t.cashier_id
               WHERE 1 = 1"#,
        );
        if let Some(id) = filter.id {
            qb.push(" AND t.id = ").push_bind(id);
        }
        let bounds = PeriodBounds {
            start: filter.from.map(|d| d.and_time(NaiveTime::MIN)),
            end: filter
                .to
                .and_then(|d| d.checked_add_days(Days::new(1)))
                .map(|d| d.and_time(NaiveTime::MIN)),
        };
        push_bounds(&mut qb, "t.created_at", bounds);
        qb.push(" ORDER BY t.created_at DESC, t.id DESC");
        if !filter.is_filtered()
            && let Some(limit) = filter.limit
        {
            qb.push(" LIMIT ").push_bind(limit);
        }
        let rows = qb.build_query_as::<TransactionRow>().fetch_all(self.pool()).await?;
        Ok(rows)
    }

    pub async fn recent_transactions(
        &self,
        bounds: PeriodBounds,
    ) -> Result<Vec<TransactionRow>, InvenError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"SELECT t.id, t.created_at, COALESCE(u.username, '(deleted)') AS cashier,
                      t.total_cents, t.payment_status, t.payment_method
               FROM transactions t
               LEFT JOIN users u ON u.id = t.cashier_id
               WHERE 1 = 1"#,
        );
        push_bounds(&mut qb, "t.created_at", bounds);
        qb.push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(RECENT_LIMIT);
        let rows = qb.build_query_as::<TransactionRow>().fetch_all(self.pool()).await?;
        Ok(rows)
    }

    pub async fn sales_trend(
        &self,
        bounds: PeriodBounds,
        granularity: TrendGranularity,
    ) -> Result<Vec<TrendPoint>, InvenError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT strftime(");
        qb.push_bind(granularity.sqlite_format());
        qb.push(
            r#", t.created_at) AS bucket,
                  COALESCE(SUM(t.total_cents), 0) AS revenue_cents,
                  COALESCE(SUM(d.units), 0) AS units
               FROM transactions t
               LEFT JOIN (
                   SELECT transaction_id, SUM(quantity) AS units
                   FROM transaction_details GROUP BY transaction_id
               ) d ON d.transaction_id = t.id
               WHERE 1 = 1"#,
        );
        push_bounds(&mut qb, "t.created_at", bounds);
        qb.push(" GROUP BY bucket ORDER BY bucket");
        let rows = qb.build_query_as::<TrendPoint>().fetch_all(self.pool()).await?;
        Ok(rows)
    }

    /// Best sellers by units, ties broken by revenue.
    pub async fn top_products(
        &self,
        bounds: PeriodBounds,
        limit: i64,
    ) -> Result<Vec<ProductSales>, InvenError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"SELECT d.product_name,
                      SUM(d.quantity) AS units,
                      SUM(d.quantity * d.unit_price_cents) AS revenue_cents
               FROM transaction_details d
               JOIN transactions t ON t.id = d.transaction_id
               WHERE 1 = 1"#,
        );
        push_bounds(&mut qb, "t.created_at", bounds);
        qb.push(" GROUP BY d.product_name ORDER BY units DESC, revenue_cents DESC LIMIT ")
            .push_bind(limit);
        let rows = qb.build_query_as::<ProductSales>().fetch_all(self.pool()).await?;
        Ok(rows)
    }

    pub async fn sales_by_category(
        &self,
        bounds: PeriodBounds,
    ) -> Result<Vec<CategorySales>, InvenError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"SELECT d.category,
                      SUM(d.quantity) AS units,
                      SUM(d.quantity * d.unit_price_cents) AS revenue_cents
               FROM transaction_details d
               JOIN transactions t ON t.id = d.transaction_id
               WHERE 1 = 1"#,
        );
        push_bounds(&mut qb, "t.created_at", bounds);
        qb.push(" GROUP BY d.category ORDER BY revenue_cents DESC, d.category");
        let rows = qb.build_query_as::<CategorySales>().fetch_all(self.pool()).await?;
        Ok(rows)
    }

    /// Days of stock left for the lowest-stocked products, at the last
    /// thirty days' average sales rate.
    pub async fn stock_forecast(&self, now: NaiveDateTime) -> Result<Vec<StockForecast>, InvenError> {
        let since = now
            .checked_sub_days(Days::new(FORECAST_WINDOW_DAYS))
            .unwrap_or(NaiveDateTime::MIN);
        let rows: Vec<(i64, String, i64, i64)> = sqlx::query_as(
            r#"SELECT p.id, p.name, p.stock_quantity,
                      COALESCE((
                          SELECT SUM(d.quantity)
                          FROM transaction_details d
                          JOIN transactions t ON t.id = d.transaction_id
                          WHERE d.product_id = p.id AND t.created_at >= ?
                      ), 0) AS sold
               FROM products p
               WHERE p.stock_quantity > 0
               ORDER BY p.stock_quantity ASC, p.id
               LIMIT ?"#,
        )
        .bind(since)
        .bind(FORECAST_LIMIT)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, product_name, stock_quantity, sold)| {
                let avg_daily_units = sold as f64 / FORECAST_WINDOW_DAYS as f64;
                let days_to_stockout =
                    (avg_daily_units > 0.0).then(|| stock_quantity as f64 / avg_daily_units);
                StockForecast {
                    product_id,
                    product_name,
                    stock_quantity,
                    avg_daily_units,
                    days_to_stockout,
                }
            })
            .collect())
    }
}
