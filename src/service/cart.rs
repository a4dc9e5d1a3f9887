use serde::Serialize;

use crate::db::models::DbProduct;
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::service::cart_store::{Cart, CartStore};
use crate::types::{Cents, checked_sum};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub product_id: i64,
    pub name: String,
    pub unit_price_cents: Cents,
    pub quantity: i64,
    pub line_total_cents: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal_cents: Cents,
    pub tax_cents: Cents,
    pub total_cents: Cents,
}

/// What a single `add` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartAdd {
    pub product: DbProduct,
    pub quantity: i64,
}

#[derive(Clone)]
pub struct CartService {
    storage: InventoryStorage,
    store: CartStore,
    tax_basis_points: i64,
}

impl CartService {
    pub fn new(storage: InventoryStorage, store: CartStore, tax_basis_points: i64) -> Self {
        Self {
            storage,
            store,
            tax_basis_points,
        }
    }

    pub fn tax_basis_points(&self) -> i64 {
        self.tax_basis_points
    }

    pub async fn load(&self, user_id: i64) -> Result<Cart, InvenError> {
        self.store.load(user_id).await
    }

    /// One more unit, refused once the cart holds the whole stock.
    pub async fn add(&self, user_id: i64, product_id: i64) -> Result<CartAdd, InvenError> {
        let product = self.storage.get_product(product_id).await?;
        let (quantity, _) = self
            .store
            .update(user_id, |cart| {
                let held = cart.get(&product_id).copied().unwrap_or(0);
                if held + 1 > product.stock_quantity {
                    return Err(InvenError::InsufficientStock {
                        product: product.name.clone(),
                        available: product.stock_quantity,
                    });
                }
                cart.insert(product_id, held + 1);
                Ok(held + 1)
            })
            .await?;
        Ok(CartAdd { product, quantity })
    }

    /// Zero or negative removes the line; more than the stock leaves the cart unchanged.
    pub async fn set_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<CartView, InvenError> {
        if quantity <= 0 {
            self.store
                .update(user_id, |cart| {
                    cart.remove(&product_id);
                    Ok(())
                })
                .await?;
            return self.view(user_id).await;
        }

        let product = self.storage.get_product(product_id).await?;
        if quantity > product.stock_quantity {
            return Err(InvenError::InsufficientStock {
                product: product.name,
                available: product.stock_quantity,
            });
        }
        self.store
            .update(user_id, |cart| {
                cart.insert(product_id, quantity);
                Ok(())
            })
            .await?;
        self.view(user_id).await
    }

    pub async fn clear(&self, user_id: i64) -> Result<(), InvenError> {
        self.store.remove(user_id).await
    }

    /// Priced cart. Lines whose product has since been deleted are skipped.
    pub async fn view(&self, user_id: i64) -> Result<CartView, InvenError> {
        let cart = self.store.load(user_id).await?;
        let ids: Vec<i64> = cart.keys().copied().collect();
        let products = self.storage.products_by_ids(&ids).await?;

        let lines = products
            .into_iter()
            .filter_map(|p| cart.get(&p.id).map(|&quantity| (p, quantity)))
            .map(|(p, quantity)| {
                Ok(CartLine {
                    product_id: p.id,
                    line_total_cents: p.price_cents.times(quantity)?,
                    unit_price_cents: p.price_cents,
                    name: p.name,
                    quantity,
                })
            })
            .collect::<Result<Vec<CartLine>, InvenError>>()?;
        let subtotal_cents = checked_sum(lines.iter().map(|l| l.line_total_cents))?;
        let tax_cents = subtotal_cents.tax(self.tax_basis_points)?;
        Ok(CartView {
            lines,
            subtotal_cents,
            tax_cents,
            total_cents: subtotal_cents.checked_add(tax_cents)?,
        })
    }
}
