use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::db::models::{AlertStatus, StockAlert};
use crate::db::reports::{
    CategorySales, HistoryFilter, ProductSales, SalesSummary, StockForecast, TransactionRow,
    TrendPoint,
};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::types::{Period, TrendGranularity};

pub const DEFAULT_TOP_PRODUCTS: i64 = 5;
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// `?period=&from=&to=` as sent by the dashboard.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

impl PeriodQuery {
    pub fn period(&self) -> Result<Period, InvenError> {
        Period::parse(self.period.as_deref(), self.from, self.to)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Trend {
    pub granularity: TrendGranularity,
    pub points: Vec<TrendPoint>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    storage: InventoryStorage,
}

impl AnalyticsService {
    pub fn new(storage: InventoryStorage) -> Self {
        Self { storage }
    }

    pub async fn sales_summary(&self, period: Period, now: NaiveDateTime) -> Result<SalesSummary, InvenError> {
        self.storage.sales_summary(period.bounds(now)).await
    }

    /// Today's figures for the cashier banner.
    pub async fn daily_summary(&self, now: NaiveDateTime) -> Result<SalesSummary, InvenError> {
        self.sales_summary(Period::Today, now).await
    }

    pub async fn transaction_history(
        &self,
        mut filter: HistoryFilter,
    ) -> Result<Vec<TransactionRow>, InvenError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from > to
        {
            return Err(InvenError::validation("to", "end date precedes start date"));
        }
        filter.limit = Some(filter.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1));
        self.storage.transaction_history(&filter).await
    }

    pub async fn recent_transactions(
        &self,
        period: Period,
        now: NaiveDateTime,
    ) -> Result<Vec<TransactionRow>, InvenError> {
        self.storage.recent_transactions(period.bounds(now)).await
    }

    pub async fn sales_trend(&self, period: Period, now: NaiveDateTime) -> Result<Trend, InvenError> {
        let granularity = period.granularity();
        let points = self.storage.sales_trend(period.bounds(now), granularity).await?;
        Ok(Trend {
            granularity,
            points,
        })
    }

    pub async fn top_products(
        &self,
        period: Period,
        limit: Option<i64>,
        now: NaiveDateTime,
    ) -> Result<Vec<ProductSales>, InvenError> {
        let limit = limit.unwrap_or(DEFAULT_TOP_PRODUCTS).clamp(1, 100);
        self.storage.top_products(period.bounds(now), limit).await
    }

    pub async fn sales_by_category(
        &self,
        period: Period,
        now: NaiveDateTime,
    ) -> Result<Vec<CategorySales>, InvenError> {
        self.storage.sales_by_category(period.bounds(now)).await
    }

    pub async fn stock_forecast(&self, now: NaiveDateTime) -> Result<Vec<StockForecast>, InvenError> {
        self.storage.stock_forecast(now).await
    }

    /// Alerts are reconciled with current stock before listing.
    pub async fn stock_alerts(
        &self,
        status: Option<AlertStatus>,
        now: NaiveDateTime,
    ) -> Result<Vec<StockAlert>, InvenError> {
        self.storage.sync_alerts(now).await?;
        self.storage.list_alerts(status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{remove_db_files, temp_storage};
    use crate::types::local_now;

    #[test]
    fn period_query_defaults_to_today() {
        assert_eq!(PeriodQuery::default().period().unwrap(), Period::Today);
        let q = PeriodQuery {
            period: Some("custom".into()),
            from: NaiveDate::from_ymd_opt(2026, 10, 1),
            to: None,
            limit: None,
        };
        assert!(q.period().is_err());
    }

    #[tokio::test]
    async fn empty_store_reports_zeroes() {
        let (db, path) = temp_storage("analytics-empty").await;
        let analytics = AnalyticsService::new(db.clone());
        let now = local_now();

        let daily = analytics.daily_summary(now).await.unwrap();
        assert_eq!(daily.transactions, 0);
        let trend = analytics.sales_trend(Period::ThisYear, now).await.unwrap();
        assert_eq!(trend.granularity, TrendGranularity::Month);
        assert!(trend.points.is_empty());
        assert!(analytics.stock_forecast(now).await.unwrap().is_empty());

        let err = analytics
            .transaction_history(HistoryFilter {
                from: NaiveDate::from_ymd_opt(2026, 10, 2),
                to: NaiveDate::from_ymd_opt(2026, 10, 1),
                ..HistoryFilter::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, InvenError::Validation { .. }));

        db.pool().close().await;
        remove_db_files(&path);
    }
}
