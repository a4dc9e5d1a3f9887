use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::error::InvenError;
use crate::middleware::extract::ApiJson;
use crate::middleware::session::{CurrentUser, TILL_OPERATORS};
use crate::router::AppState;
use crate::service::cart::{CartAdd, CartView};

#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct AddItemResponse {
    pub added: CartAdd,
    pub cart: CartView,
}

pub async fn view_cart(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<CartView>, InvenError> {
    current.require(TILL_OPERATORS)?;
    Ok(Json(state.carts.view(current.id()).await?))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, InvenError> {
    current.require(TILL_OPERATORS)?;
    state.carts.clear(current.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_item(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<AddItem>,
) -> Result<Json<AddItemResponse>, InvenError> {
    current.require(TILL_OPERATORS)?;
    let added = state.carts.add(current.id(), body.product_id).await?;
    let cart = state.carts.view(current.id()).await?;
    Ok(Json(AddItemResponse { added, cart }))
}

pub async fn set_quantity(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(product_id): Path<i64>,
    ApiJson(body): ApiJson<SetQuantity>,
) -> Result<Json<CartView>, InvenError> {
    current.require(TILL_OPERATORS)?;
    Ok(Json(
        state
            .carts
            .set_quantity(current.id(), product_id, body.quantity)
            .await?,
    ))
}
