use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::db::models::{Category, DbProduct};
use crate::db::products::{CategoryCount, InventorySummary, ProductFilter};
use crate::error::InvenError;
use crate::middleware::extract::{ApiJson, ApiQuery};
use crate::middleware::session::{CATALOG_WRITERS, CurrentUser};
use crate::router::AppState;
use crate::service::catalog::{ProductInput, ProductPatch};

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Debug, Deserialize)]
pub struct Restock {
    pub delta: i64,
}

pub async fn list_categories(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<Vec<Category>>, InvenError> {
    Ok(Json(state.catalog.list_categories().await?))
}

pub async fn add_category(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<NewCategory>,
) -> Result<(StatusCode, Json<Category>), InvenError> {
    current.require(CATALOG_WRITERS)?;
    let category = state.catalog.add_category(&body.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn category_distribution(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<Vec<CategoryCount>>, InvenError> {
    Ok(Json(state.catalog.category_distribution().await?))
}

pub async fn search_products(
    State(state): State<AppState>,
    _current: CurrentUser,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<Vec<DbProduct>>, InvenError> {
    let filter = ProductFilter {
        query: query.q,
        category: query.category,
        low_stock_only: query.low_stock,
    };
    Ok(Json(state.catalog.search_products(&filter).await?))
}

pub async fn register_product(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<DbProduct>), InvenError> {
    current.require(CATALOG_WRITERS)?;
    let product = state.catalog.register_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbProduct>, InvenError> {
    Ok(Json(state.catalog.get_product(id).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Json<DbProduct>, InvenError> {
    current.require(CATALOG_WRITERS)?;
    Ok(Json(state.catalog.update_product(id, patch).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, InvenError> {
    current.require(CATALOG_WRITERS)?;
    state.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restock(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<Restock>,
) -> Result<Json<DbProduct>, InvenError> {
    current.require(CATALOG_WRITERS)?;
    Ok(Json(state.catalog.restock(id, body.delta).await?))
}

pub async fn find_by_barcode(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(code): Path<String>,
) -> Result<Json<DbProduct>, InvenError> {
    Ok(Json(state.catalog.find_by_barcode(&code).await?))
}

pub async fn backfill_barcodes(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Value>, InvenError> {
    current.require(CATALOG_WRITERS)?;
    let assigned = state.catalog.backfill_barcodes().await?;
    Ok(Json(json!({ "assigned": assigned })))
}

pub async fn inventory_summary(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<InventorySummary>, InvenError> {
    Ok(Json(state.catalog.inventory_summary().await?))
}
