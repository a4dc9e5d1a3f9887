use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db::models::{Category, DbProduct, StockStatus};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::types::Cents;

const PRODUCT_COLUMNS: &str =
    "id, name, category, barcode, price_cents, stock_quantity, image_path, status, created_at";

/// Category name used by the POS to mean "no category filter".
pub const ALL_CATEGORIES: &str = "All Items";

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price_cents: Cents,
    pub stock_quantity: i64,
    pub barcode: String,
    pub image_path: Option<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<Cents>,
    pub stock_quantity: Option<i64>,
    pub barcode: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub query: Option<String>,
    pub category: Option<String>,
    pub low_stock_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub products: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventorySummary {
    pub total_products: i64,
    pub total_categories: i64,
    pub inventory_value_cents: Cents,
    pub low_stock_count: i64,
    pub low_stock_items: Vec<DbProduct>,
    /// Newest additions first.
    pub recent_products: Vec<DbProduct>,
}

/// Recompute `status` for one product from its current stock.
pub(crate) async fn refresh_status(
    conn: &mut SqliteConnection,
    product_id: i64,
    low_stock_threshold: i64,
) -> Result<(), InvenError> {
    sqlx::query(
        r#"UPDATE products SET status = CASE
               WHEN stock_quantity <= 0 THEN ?
               WHEN stock_quantity <= ? THEN ?
               ELSE ?
           END
           WHERE id = ?"#,
    )
    .bind(StockStatus::OutOfStock)
    .bind(low_stock_threshold)
    .bind(StockStatus::LowStock)
    .bind(StockStatus::InStock)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

fn map_barcode_conflict(e: InvenError, barcode: &str) -> InvenError {
    if e.is_unique_violation() {
        InvenError::Conflict(format!("barcode '{barcode}' already assigned"))
    } else {
        e
    }
}

impl InventoryStorage {
    pub async fn list_categories(&self) -> Result<Vec<Category>, InvenError> {
        let rows = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    /// Case-insensitive lookup returning the stored spelling.
    pub async fn find_category(&self, name: &str) -> Result<Option<Category>, InvenError> {
        let row = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    pub async fn add_category(&self, name: &str) -> Result<Category, InvenError> {
        let result = sqlx::query("INSERT INTO categories (name) VALUES (?)")
            .bind(name)
            .execute(self.pool())
            .await
            .map_err(InvenError::from);
        match result {
            Ok(done) => Ok(Category {
                id: done.last_insert_rowid(),
                name: name.to_string(),
            }),
            Err(e) if e.is_unique_violation() => {
                Err(InvenError::Conflict(format!("category '{name}' already exists")))
            }
            Err(e) => Err(e),
        }
    }

    /// Product count per category, including empty categories.
    pub async fn category_distribution(&self) -> Result<Vec<CategoryCount>, InvenError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT c.name, COUNT(p.id)
               FROM categories c
               LEFT JOIN products p ON p.category = c.name
               GROUP BY c.id, c.name
               ORDER BY c.id"#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|(category, products)| CategoryCount { category, products })
            .collect())
    }

    pub async fn insert_product(
        &self,
        product: &NewProduct,
        now: NaiveDateTime,
    ) -> Result<DbProduct, InvenError> {
        let status = StockStatus::from_quantity(product.stock_quantity, self.low_stock_threshold());
        let result = sqlx::query(
            r#"INSERT INTO products
                   (name, category, barcode, price_cents, stock_quantity, image_path, status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.barcode)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(&product.image_path)
        .bind(status)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(InvenError::from)
        .map_err(|e| map_barcode_conflict(e, &product.barcode))?;

        self.get_product(result.last_insert_rowid()).await
    }

    pub async fn get_product(&self, id: i64) -> Result<DbProduct, InvenError> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        sqlx::query_as::<_, DbProduct>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| InvenError::not_found(format!("product {id}")))
    }

    pub async fn find_product_by_barcode(&self, code: &str) -> Result<Option<DbProduct>, InvenError> {
        let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = ?");
        let product = sqlx::query_as::<_, DbProduct>(&query)
            .bind(code)
            .fetch_optional(self.pool())
            .await?;
        Ok(product)
    }

    pub async fn barcode_exists(&self, code: &str) -> Result<bool, InvenError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE barcode = ?")
            .bind(code)
            .fetch_one(self.pool())
            .await?;
        Ok(count > 0)
    }

    /// Fetch the given products; missing ids are simply absent from the result.
    pub async fn products_by_ids(&self, ids: &[i64]) -> Result<Vec<DbProduct>, InvenError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(*id);
        }
        qb.push(") ORDER BY id");
        let rows = qb.build_query_as::<DbProduct>().fetch_all(self.pool()).await?;
        Ok(rows)
    }

    pub async fn update_product(
        &self,
        id: i64,
        update: &ProductUpdate,
    ) -> Result<DbProduct, InvenError> {
        let mut tx = self.pool().begin().await?;
        let done = sqlx::query(
            r#"UPDATE products SET
                   name = COALESCE(?, name),
                   category = COALESCE(?, category),
                   price_cents = COALESCE(?, price_cents),
                   stock_quantity = COALESCE(?, stock_quantity),
                   barcode = COALESCE(?, barcode),
                   image_path = COALESCE(?, image_path)
               WHERE id = ?"#,
        )
        .bind(&update.name)
        .bind(&update.category)
        .bind(update.price_cents)
        .bind(update.stock_quantity)
        .bind(&update.barcode)
        .bind(&update.image_path)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(InvenError::from)
        .map_err(|e| map_barcode_conflict(e, update.barcode.as_deref().unwrap_or_default()))?;

        if done.rows_affected() == 0 {
            return Err(InvenError::not_found(format!("product {id}")));
        }
        refresh_status(&mut tx, id, self.low_stock_threshold()).await?;
        tx.commit().await?;
        self.get_product(id).await
    }

    /// Add `delta` (may be negative) to stock; the result must stay within `0..=max_stock`.
    pub async fn adjust_stock(&self, id: i64, delta: i64, max_stock: i64) -> Result<DbProduct, InvenError> {
        let mut tx = self.pool().begin().await?;
        let done = sqlx::query(
            "UPDATE products SET stock_quantity = stock_quantity + ? WHERE id = ? AND stock_quantity + ? BETWEEN 0 AND ?",
        )
        .bind(delta)
        .bind(id)
        .bind(delta)
        .bind(max_stock)
        .execute(&mut *tx)
        .await?;

        if done.rows_affected() == 0 {
            let current: Option<(String, i64)> =
                sqlx::query_as("SELECT name, stock_quantity FROM products WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match current {
                Some((product, available)) if delta < 0 => {
                    InvenError::InsufficientStock { product, available }
                }
                Some(_) => InvenError::validation(
                    "delta",
                    format!("stock cannot exceed {max_stock} units"),
                ),
                None => InvenError::not_found(format!("product {id}")),
            });
        }
        refresh_status(&mut tx, id, self.low_stock_threshold()).await?;
        tx.commit().await?;
        self.get_product(id).await
    }

    pub async fn delete_product(&self, id: i64) -> Result<(), InvenError> {
        let done = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(InvenError::not_found(format!("product {id}")));
        }
        Ok(())
    }

    /// A numeric query matches the product id exactly; anything else is a
    /// case-insensitive substring match on the name.
    pub async fn search_products(&self, filter: &ProductFilter) -> Result<Vec<DbProduct>, InvenError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"));

        if let Some(q) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            match q.parse::<i64>() {
                Ok(id) if q.chars().all(|c| c.is_ascii_digit()) => {
                    qb.push(" AND id = ").push_bind(id);
                }
                _ => {
                    qb.push(" AND LOWER(name) LIKE ")
                        .push_bind(format!("%{}%", q.to_lowercase()));
                }
            }
        }
        if let Some(category) = filter
            .category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
        {
            qb.push(" AND category = ").push_bind(category.to_string());
        }
        if filter.low_stock_only {
            qb.push(" AND stock_quantity <= ")
                .push_bind(self.low_stock_threshold());
        }
        qb.push(" ORDER BY name, id");

        let rows = qb.build_query_as::<DbProduct>().fetch_all(self.pool()).await?;
        Ok(rows)
    }

    pub async fn products_without_barcode(&self) -> Result<Vec<i64>, InvenError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM products WHERE barcode IS NULL OR barcode = '' ORDER BY id")
                .fetch_all(self.pool())
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn set_barcode(&self, id: i64, code: &str) -> Result<(), InvenError> {
        sqlx::query("UPDATE products SET barcode = ? WHERE id = ?")
            .bind(code)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(InvenError::from)
            .map_err(|e| map_barcode_conflict(e, code))?;
        Ok(())
    }

    /// Dashboard cards: counts, stock value, the lowest-stock items and the latest additions.
    pub async fn inventory_summary(
        &self,
        item_limit: i64,
        recent_limit: i64,
    ) -> Result<InventorySummary, InvenError> {
        let threshold = self.low_stock_threshold();
        let (total_products, inventory_value): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(price_cents * stock_quantity), 0) FROM products",
        )
        .fetch_one(self.pool())
        .await?;
        let (total_categories,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(self.pool())
            .await?;
        let (low_stock_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM products WHERE stock_quantity <= ?")
                .bind(threshold)
                .fetch_one(self.pool())
                .await?;

        let query = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE stock_quantity <= ? ORDER BY stock_quantity ASC, id LIMIT ?"
        );
        let low_stock_items = sqlx::query_as::<_, DbProduct>(&query)
            .bind(threshold)
            .bind(item_limit)
            .fetch_all(self.pool())
            .await?;

        let query =
            format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC LIMIT ?");
        let recent_products = sqlx::query_as::<_, DbProduct>(&query)
            .bind(recent_limit)
            .fetch_all(self.pool())
            .await?;

        Ok(InventorySummary {
            total_products,
            total_categories,
            inventory_value_cents: Cents(inventory_value),
            low_stock_count,
            low_stock_items,
            recent_products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{remove_db_files, temp_storage};
    use crate::types::local_now;

    fn product(name: &str, category: &str, price: i64, stock: i64, barcode: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: category.to_string(),
            price_cents: Cents(price),
            stock_quantity: stock,
            barcode: barcode.to_string(),
            image_path: None,
        }
    }

    #[tokio::test]
    async fn status_follows_stock_changes() {
        let (db, path) = temp_storage("products-status").await;
        let p = db
            .insert_product(&product("Stapler", "Stationery", 450, 10, "100000000001"), local_now())
            .await
            .unwrap();
        assert_eq!(p.status, StockStatus::InStock);

        let p = db.adjust_stock(p.id, -6, 1_000).await.unwrap();
        assert_eq!(p.stock_quantity, 4);
        assert_eq!(p.status, StockStatus::LowStock);

        let err = db.adjust_stock(p.id, -5, 1_000).await.unwrap_err();
        assert!(matches!(err, InvenError::InsufficientStock { available: 4, .. }));

        let p = db.adjust_stock(p.id, -4, 1_000).await.unwrap();
        assert_eq!(p.status, StockStatus::OutOfStock);
        let err = db.adjust_stock(p.id, 1_001, 1_000).await.unwrap_err();
        assert!(matches!(err, InvenError::Validation { field: "delta", .. }));

        let p = db
            .update_product(
                p.id,
                &ProductUpdate {
                    stock_quantity: Some(30),
                    ..ProductUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(p.status, StockStatus::InStock);
        assert_eq!(p.name, "Stapler");

        db.pool().close().await;
        remove_db_files(&path);
    }

    #[tokio::test]
    async fn search_by_id_name_category_and_low_stock() {
        let (db, path) = temp_storage("products-search").await;
        let now = local_now();
        let desk = db
            .insert_product(&product("Standing Desk", "Furniture", 89900, 3, "200000000001"), now)
            .await
            .unwrap();
        db.insert_product(&product("Desk Lamp", "Electronics", 5900, 40, "200000000002"), now)
            .await
            .unwrap();
        db.insert_product(&product("Football", "Sports", 3500, 12, "200000000003"), now)
            .await
            .unwrap();

        let by_name = db
            .search_products(&ProductFilter {
                query: Some("DESK".into()),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 2);

        let by_id = db
            .search_products(&ProductFilter {
                query: Some(desk.id.to_string()),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_id, vec![desk.clone()]);

        let furniture_low = db
            .search_products(&ProductFilter {
                query: None,
                category: Some("Furniture".into()),
                low_stock_only: true,
            })
            .await
            .unwrap();
        assert_eq!(furniture_low, vec![desk]);

        let all = db
            .search_products(&ProductFilter {
                category: Some(ALL_CATEGORIES.into()),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        db.pool().close().await;
        remove_db_files(&path);
    }

    #[tokio::test]
    async fn duplicate_barcode_and_category_conflict() {
        let (db, path) = temp_storage("products-conflict").await;
        let now = local_now();
        db.insert_product(&product("Pen", "Stationery", 150, 100, "300000000001"), now)
            .await
            .unwrap();
        let err = db
            .insert_product(&product("Pencil", "Stationery", 100, 100, "300000000001"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, InvenError::Conflict(_)));

        let err = db.add_category("sports").await.unwrap_err();
        assert!(matches!(err, InvenError::Conflict(_)));

        db.add_category("Groceries").await.unwrap();
        let dist = db.category_distribution().await.unwrap();
        let groceries = dist.iter().find(|c| c.category == "Groceries").unwrap();
        assert_eq!(groceries.products, 0);
        let stationery = dist.iter().find(|c| c.category == "Stationery").unwrap();
        assert_eq!(stationery.products, 1);

        db.pool().close().await;
        remove_db_files(&path);
    }

    #[tokio::test]
    async fn summary_counts_value_and_low_items() {
        let (db, path) = temp_storage("products-summary").await;
        let now = local_now();
        db.insert_product(&product("Chair", "Furniture", 10000, 2, "400000000001"), now)
            .await
            .unwrap();
        db.insert_product(&product("Ball", "Sports", 2000, 10, "400000000002"), now)
            .await
            .unwrap();

        let summary = db.inventory_summary(10, 1).await.unwrap();
        assert_eq!(summary.total_products, 2);
        assert_eq!(summary.total_categories, 4);
        assert_eq!(summary.inventory_value_cents, Cents(40000));
        assert_eq!(summary.low_stock_count, 1);
        assert_eq!(summary.low_stock_items[0].name, "Chair");
        assert_eq!(summary.recent_products.len(), 1);
        assert_eq!(summary.recent_products[0].name, "Ball");

        db.pool().close().await;
        remove_db_files(&path);
    }
}
