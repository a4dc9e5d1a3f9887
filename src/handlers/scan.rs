use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::InvenError;
use crate::middleware::extract::ApiQuery;
use crate::middleware::session::{CurrentUser, TILL_OPERATORS};
use crate::router::AppState;
use crate::service::scanner::ScanEvent;

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(default)]
    pub code: String,
}

/// `GET /scan?code=...&token=...`, hit by the phone scanner. Always answers
/// 204 once accepted; the outcome is collected via `/api/scan/events`.
pub async fn scan(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<ScanQuery>,
) -> Result<StatusCode, InvenError> {
    current.require(TILL_OPERATORS)?;
    let code = query.code.trim();
    if code.is_empty() {
        return Ok(StatusCode::NO_CONTENT);
    }
    let scanner = state
        .scanner
        .as_ref()
        .ok_or_else(|| InvenError::not_found("scanner"))?;
    scanner.submit(current.id(), code)?;
    debug!(user_id = current.id(), code, "scan queued");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn drain_events(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<ScanEvent>>, InvenError> {
    current.require(TILL_OPERATORS)?;
    match state.scanner.as_ref() {
        Some(scanner) => Ok(Json(scanner.drain(current.id()).await?)),
        None => Ok(Json(Vec::new())),
    }
}
