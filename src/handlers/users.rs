use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::db::models::UserProfile;
use crate::error::InvenError;
use crate::middleware::extract::ApiJson;
use crate::middleware::session::{CurrentUser, MANAGERS};
use crate::router::AppState;
use crate::service::accounts::{ProfileUpdate, RegisterRequest};

pub async fn profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<UserProfile>, InvenError> {
    Ok(Json(state.accounts.profile(current.id()).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<UserProfile>, InvenError> {
    Ok(Json(state.accounts.update_profile(current.id(), update).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<UserProfile>>, InvenError> {
    current.require(MANAGERS)?;
    Ok(Json(state.accounts.list_users().await?))
}

/// Staff accounts (Admin, Cashier or Manager) are created by a Manager.
pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), InvenError> {
    current.require(MANAGERS)?;
    let user = state.accounts.register(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, InvenError> {
    current.require(MANAGERS)?;
    state.accounts.delete_user(current.id(), id).await?;
    state.carts.clear(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
