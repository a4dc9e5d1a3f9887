use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::models::DbTransaction;
use crate::db::reports::{HistoryFilter, TransactionRow};
use crate::db::sales::SaleRecord;
use crate::error::InvenError;
use crate::middleware::extract::{ApiJson, ApiQuery};
use crate::middleware::session::{CurrentUser, MANAGERS, TILL_OPERATORS};
use crate::router::AppState;
use crate::service::payment::PaymentRequest;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub checkout_key: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceiptQuery {
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
}

/// 201 for a new sale, 200 when the key was already used.
pub async fn checkout(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<CheckoutBody>,
) -> Result<(StatusCode, Json<SaleRecord>), InvenError> {
    current.require(TILL_OPERATORS)?;
    let record = state
        .checkout
        .checkout(current.id(), &body.checkout_key)
        .await?;
    let status = if record.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(record)))
}

pub async fn pay(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    ApiJson(request): ApiJson<PaymentRequest>,
) -> Result<Json<DbTransaction>, InvenError> {
    current.require(TILL_OPERATORS)?;
    Ok(Json(state.payments.pay(id, request).await?))
}

/// JSON by default; `?format=text` returns the printable slip.
pub async fn receipt(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<ReceiptQuery>,
) -> Result<Response, InvenError> {
    let receipt = state.payments.receipt(id).await?;
    match query.format.as_deref() {
        Some("text") => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            receipt.render_text(&state.currency),
        )
            .into_response()),
        _ => Ok(Json(receipt).into_response()),
    }
}

pub async fn transaction_history(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<TransactionRow>>, InvenError> {
    current.require(MANAGERS)?;
    let filter = HistoryFilter {
        id: query.id,
        from: query.from,
        to: query.to,
        limit: query.limit,
    };
    Ok(Json(state.analytics.transaction_history(filter).await?))
}
