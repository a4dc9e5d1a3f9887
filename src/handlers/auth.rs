use axum::{Json, extract::State, http::StatusCode};

use crate::db::models::UserProfile;
use crate::error::InvenError;
use crate::middleware::extract::ApiJson;
use crate::middleware::session::CurrentUser;
use crate::router::AppState;
use crate::service::accounts::{LoginRequest, LoginResponse, RegisterRequest};

/// Self-registration; only succeeds for the first account.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), InvenError> {
    let user = state.accounts.bootstrap(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, InvenError> {
    Ok(Json(state.accounts.login(req).await?))
}

/// The cart is left in place for the next login.
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> StatusCode {
    state.accounts.logout(&current.token).await;
    StatusCode::NO_CONTENT
}
