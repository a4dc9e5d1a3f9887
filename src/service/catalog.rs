use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::models::{Category, DbProduct};
use crate::db::products::{CategoryCount, InventorySummary, NewProduct, ProductFilter, ProductUpdate};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::service::validation::{MAX_STOCK, validate_price, validate_product, validate_stock};
use crate::types::{Cents, local_now};

/// Low-stock items listed on the inventory summary.
pub const SUMMARY_ITEM_LIMIT: i64 = 10;
pub const RECENT_PRODUCT_LIMIT: i64 = 5;
const BARCODE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub category: String,
    pub price_cents: Cents,
    pub stock_quantity: i64,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<Cents>,
    pub stock_quantity: Option<i64>,
    pub barcode: Option<String>,
    pub image_path: Option<String>,
}

fn random_digits(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct CatalogService {
    storage: InventoryStorage,
    barcode_length: usize,
}

impl CatalogService {
    pub fn new(storage: InventoryStorage, barcode_length: usize) -> Self {
        Self {
            storage,
            barcode_length,
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, InvenError> {
        self.storage.list_categories().await
    }

    pub async fn add_category(&self, name: &str) -> Result<Category, InvenError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InvenError::validation("name", "category name is required"));
        }
        let category = self.storage.add_category(name).await?;
        info!(category = %category.name, "category added");
        Ok(category)
    }

    pub async fn category_distribution(&self) -> Result<Vec<CategoryCount>, InvenError> {
        self.storage.category_distribution().await
    }

    async fn canonical_category(&self, name: &str) -> Result<String, InvenError> {
        self.storage
            .find_category(name.trim())
            .await?
            .map(|c| c.name)
            .ok_or_else(|| InvenError::validation("category", format!("unknown category '{}'", name.trim())))
    }

    /// A fresh code not assigned to any product.
    pub async fn generate_barcode(&self) -> Result<String, InvenError> {
        for _ in 0..BARCODE_ATTEMPTS {
            let code = random_digits(self.barcode_length);
            if !self.storage.barcode_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(InvenError::Conflict(
            "could not generate a unique barcode".to_string(),
        ))
    }

    pub async fn register_product(&self, input: ProductInput) -> Result<DbProduct, InvenError> {
        validate_product(&input.name, &input.category, input.price_cents, input.stock_quantity)?;
        let category = self.canonical_category(&input.category).await?;
        let barcode = match non_empty(input.barcode) {
            Some(code) => code,
            None => self.generate_barcode().await?,
        };
        let product = self
            .storage
            .insert_product(
                &NewProduct {
                    name: input.name.trim().to_string(),
                    category,
                    price_cents: input.price_cents,
                    stock_quantity: input.stock_quantity,
                    barcode,
                    image_path: non_empty(input.image_path),
                },
                local_now(),
            )
            .await?;
        info!(product_id = product.id, name = %product.name, barcode = ?product.barcode, "product registered");
        Ok(product)
    }

    pub async fn update_product(&self, id: i64, patch: ProductPatch) -> Result<DbProduct, InvenError> {
        if let Some(name) = &patch.name
            && name.trim().is_empty()
        {
            return Err(InvenError::validation("name", "is required"));
        }
        if let Some(price) = patch.price_cents {
            validate_price(price)?;
        }
        if let Some(stock) = patch.stock_quantity {
            validate_stock(stock)?;
        }
        let category = match &patch.category {
            Some(c) => Some(self.canonical_category(c).await?),
            None => None,
        };
        let update = ProductUpdate {
            name: patch.name.map(|n| n.trim().to_string()),
            category,
            price_cents: patch.price_cents,
            stock_quantity: patch.stock_quantity,
            barcode: non_empty(patch.barcode),
            image_path: non_empty(patch.image_path),
        };
        let product = self.storage.update_product(id, &update).await?;
        info!(product_id = id, status = ?product.status, "product updated");
        Ok(product)
    }

    pub async fn restock(&self, id: i64, delta: i64) -> Result<DbProduct, InvenError> {
        if delta == 0 {
            return Err(InvenError::validation("delta", "must not be zero"));
        }
        if delta.unsigned_abs() > MAX_STOCK.unsigned_abs() {
            return Err(InvenError::validation("delta", format!("cannot exceed {MAX_STOCK} units")));
        }
        let product = self.storage.adjust_stock(id, delta, MAX_STOCK).await?;
        info!(product_id = id, delta, stock = product.stock_quantity, "stock adjusted");
        if let Err(e) = self.storage.sync_alerts(local_now()).await {
            warn!(error = %e, "stock alert sync after restock failed");
        }
        Ok(product)
    }

    pub async fn delete_product(&self, id: i64) -> Result<(), InvenError> {
        self.storage.delete_product(id).await?;
        info!(product_id = id, "product deleted");
        Ok(())
    }

    pub async fn get_product(&self, id: i64) -> Result<DbProduct, InvenError> {
        self.storage.get_product(id).await
    }

    pub async fn find_by_barcode(&self, code: &str) -> Result<DbProduct, InvenError> {
        self.storage
            .find_product_by_barcode(code.trim())
            .await?
            .ok_or_else(|| InvenError::not_found(format!("barcode {}", code.trim())))
    }

    pub async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<DbProduct>, InvenError> {
        self.storage.search_products(filter).await
    }

    /// Give every product without a barcode a generated one; returns how many.
    pub async fn backfill_barcodes(&self) -> Result<usize, InvenError> {
        let ids = self.storage.products_without_barcode().await?;
        for id in &ids {
            let code = self.generate_barcode().await?;
            self.storage.set_barcode(*id, &code).await?;
        }
        if !ids.is_empty() {
            info!(count = ids.len(), "barcodes backfilled");
        }
        Ok(ids.len())
    }

    pub async fn inventory_summary(&self) -> Result<InventorySummary, InvenError> {
        self.storage
            .inventory_summary(SUMMARY_ITEM_LIMIT, RECENT_PRODUCT_LIMIT)
            .await
    }
}
