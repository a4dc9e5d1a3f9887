use tracing::{info, warn};

use crate::db::sales::{SaleLine, SaleRecord};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::service::cart::CartService;
use crate::types::local_now;

#[derive(Clone)]
pub struct CheckoutService {
    storage: InventoryStorage,
    carts: CartService,
}

impl CheckoutService {
    pub fn new(storage: InventoryStorage, carts: CartService) -> Self {
        Self { storage, carts }
    }

    /// Turn the cashier's cart into a pending transaction. A repeated
    /// `checkout_key` from the same cashier returns the transaction it already
    /// produced; another cashier's key is refused.
    pub async fn checkout(&self, cashier_id: i64, checkout_key: &str) -> Result<SaleRecord, InvenError> {
        let checkout_key = checkout_key.trim();
        if checkout_key.is_empty() {
            return Err(InvenError::validation("checkout_key", "is required"));
        }
        if let Some(record) = self.storage.replay_sale(cashier_id, checkout_key).await? {
            return Ok(record);
        }

        let cart = self.carts.load(cashier_id).await?;
        if cart.is_empty() {
            return Err(InvenError::validation("cart", "cart is empty"));
        }
        let lines: Vec<SaleLine> = cart
            .iter()
            .map(|(&product_id, &quantity)| SaleLine {
                product_id,
                quantity,
            })
            .collect();

        let record = self
            .storage
            .record_sale(
                cashier_id,
                checkout_key,
                &lines,
                self.carts.tax_basis_points(),
                local_now(),
            )
            .await?;
        if record.replayed {
            return Ok(record);
        }

        self.carts.clear(cashier_id).await?;
        info!(
            transaction_id = record.transaction.id,
            cashier_id,
            lines = record.details.len(),
            total = %record.transaction.total_cents,
            "checkout recorded"
        );

        // The sale is committed; alert bookkeeping failures are logged only.
        if let Err(e) = self.storage.sync_alerts(local_now()).await {
            warn!(error = %e, "stock alert sync after checkout failed");
        }
        if !record.low_stock.is_empty() {
            let recipients = self.storage.admin_emails().await.unwrap_or_else(|e| {
                warn!(error = %e, "could not load admin e-mails");
                Vec::new()
            });
            for item in &record.low_stock {
                warn!(
                    product_id = item.product_id,
                    product = %item.product_name,
                    stock = item.stock_quantity,
                    notify = ?recipients,
                    "low stock after sale"
                );
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AlertStatus, PaymentStatus, Role};
    use crate::db::products::NewProduct;
    use crate::db::test_support::{remove_db_files, temp_path, temp_storage};
    use crate::db::users::NewUser;
    use crate::service::cart_store::CartStore;
    use crate::types::Cents;

    #[tokio::test]
    async fn checkout_clears_cart_opens_alerts_and_replays() {
        let (db, db_path) = temp_storage("checkout").await;
        let cart_path = temp_path("checkout", "json");
        let carts = CartService::new(db.clone(), CartStore::new(&cart_path), 600);
        let checkout = CheckoutService::new(db.clone(), carts.clone());

        let cashier = db
            .insert_user(
                &NewUser {
                    username: "till".into(),
                    email: "till@shop.my".into(),
                    phone: "0120000001".into(),
                    password_hash: "x".into(),
                    role: Role::Cashier,
                },
                local_now(),
            )
            .await
            .unwrap();
        let glue = db
            .insert_product(
                &NewProduct {
                    name: "Glue".into(),
                    category: "Stationery".into(),
                    price_cents: Cents(500),
                    stock_quantity: 7,
                    barcode: "910000000001".into(),
                    image_path: None,
                },
                local_now(),
            )
            .await
            .unwrap();

        let err = checkout.checkout(cashier, "k-empty").await.unwrap_err();
        assert!(matches!(err, InvenError::Validation { field: "cart", .. }));

        carts.set_quantity(cashier, glue.id, 3).await.unwrap();
        let record = checkout.checkout(cashier, "k-1").await.unwrap();
        assert_eq!(record.transaction.payment_status, PaymentStatus::Pending);
        assert_eq!(record.transaction.total_cents, Cents(1590));
        assert!(carts.load(cashier).await.unwrap().is_empty());

        let alerts = db.list_alerts(Some(AlertStatus::Active)).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].stock_quantity, 4);

        let again = checkout.checkout(cashier, "k-1").await.unwrap();
        assert!(again.replayed);
        assert_eq!(again.transaction.id, record.transaction.id);
        assert_eq!(db.get_product(glue.id).await.unwrap().stock_quantity, 4);

        // Another till reusing the key must not get the first till's sale.
        let other = db
            .insert_user(
                &NewUser {
                    username: "till2".into(),
                    email: "till2@shop.my".into(),
                    phone: "0120000002".into(),
                    password_hash: "x".into(),
                    role: Role::Cashier,
                },
                local_now(),
            )
            .await
            .unwrap();
        carts.set_quantity(other, glue.id, 2).await.unwrap();
        let err = checkout.checkout(other, "k-1").await.unwrap_err();
        assert!(matches!(err, InvenError::Conflict(_)));
        assert_eq!(carts.load(other).await.unwrap().get(&glue.id), Some(&2));
        assert_eq!(db.get_product(glue.id).await.unwrap().stock_quantity, 4);

        let own = checkout.checkout(other, "k-2").await.unwrap();
        assert!(!own.replayed);
        assert_eq!(own.transaction.cashier_id, Some(other));
        assert_eq!(db.get_product(glue.id).await.unwrap().stock_quantity, 2);

        db.pool().close().await;
        remove_db_files(&db_path);
        let _ = std::fs::remove_file(&cart_path);
    }
}
