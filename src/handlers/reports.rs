use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::db::models::{AlertStatus, StockAlert};
use crate::db::reports::{
    CategorySales, ProductSales, SalesSummary, StockForecast, TransactionRow,
};
use crate::error::InvenError;
use crate::middleware::extract::ApiQuery;
use crate::middleware::session::{CATALOG_WRITERS, CurrentUser, MANAGERS};
use crate::router::AppState;
use crate::service::analytics::{PeriodQuery, Trend};
use crate::types::local_now;

#[derive(Debug, Default, Deserialize)]
pub struct AlertQuery {
    pub status: Option<AlertStatus>,
}

pub async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, InvenError> {
    sqlx::query("SELECT 1").execute(state.storage.pool()).await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn sales_summary(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> Result<Json<SalesSummary>, InvenError> {
    current.require(MANAGERS)?;
    let period = query.period()?;
    Ok(Json(state.analytics.sales_summary(period, local_now()).await?))
}

/// Open to every role: the till shows today's totals too.
pub async fn daily_summary(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<SalesSummary>, InvenError> {
    Ok(Json(state.analytics.daily_summary(local_now()).await?))
}

pub async fn recent_transactions(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> Result<Json<Vec<TransactionRow>>, InvenError> {
    current.require(MANAGERS)?;
    let period = query.period()?;
    Ok(Json(
        state
            .analytics
            .recent_transactions(period, local_now())
            .await?,
    ))
}

pub async fn sales_trend(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> Result<Json<Trend>, InvenError> {
    current.require(MANAGERS)?;
    let period = query.period()?;
    Ok(Json(state.analytics.sales_trend(period, local_now()).await?))
}

pub async fn top_products(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> Result<Json<Vec<ProductSales>>, InvenError> {
    current.require(MANAGERS)?;
    let period = query.period()?;
    Ok(Json(
        state
            .analytics
            .top_products(period, query.limit, local_now())
            .await?,
    ))
}

pub async fn sales_by_category(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<PeriodQuery>,
) -> Result<Json<Vec<CategorySales>>, InvenError> {
    current.require(MANAGERS)?;
    let period = query.period()?;
    Ok(Json(
        state
            .analytics
            .sales_by_category(period, local_now())
            .await?,
    ))
}

pub async fn stock_forecast(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<StockForecast>>, InvenError> {
    current.require(MANAGERS)?;
    Ok(Json(state.analytics.stock_forecast(local_now()).await?))
}

/// Admins and Managers watch stock alerts.
pub async fn stock_alerts(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<AlertQuery>,
) -> Result<Json<Vec<StockAlert>>, InvenError> {
    current.require(CATALOG_WRITERS)?;
    Ok(Json(
        state
            .analytics
            .stock_alerts(query.status, local_now())
            .await?,
    ))
}
