use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::models::{
    DbTransaction, DbTransactionDetail, LowStockItem, PaymentMethod, PaymentStatus,
};
use crate::db::products::refresh_status;
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::types::Cents;

const TRANSACTION_COLUMNS: &str = "id, checkout_key, cashier_id, created_at, subtotal_cents, tax_cents, \
     total_cents, payment_status, payment_method, tendered_cents, change_cents, paid_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLine {
    pub product_id: i64,
    pub quantity: i64,
}

/// Result of recording a sale.
#[derive(Debug, Clone, Serialize)]
pub struct SaleRecord {
    pub transaction: DbTransaction,
    pub details: Vec<DbTransactionDetail>,
    /// Products left at or below the low-stock threshold by this sale.
    pub low_stock: Vec<LowStockItem>,
    /// True when `checkout_key` had already been recorded and nothing was deducted.
    pub replayed: bool,
}

/// How a pending transaction is being settled.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub method: PaymentMethod,
    pub tendered: Option<Cents>,
    pub change: Option<Cents>,
}

/// Hashed card details persisted alongside a card settlement.
#[derive(Debug, Clone)]
pub struct CardRecord {
    pub cardholder_hash: String,
    pub card_hash: String,
    pub expiry_hash: String,
    pub card_last4: String,
}

impl InventoryStorage {
    /// Record a sale atomically: one transaction row, a detail row per line, and a
    /// conditional stock deduction per line. Any line that cannot be satisfied
    /// rolls the whole sale back. Replaying a `checkout_key` returns the original.
    pub async fn record_sale(
        &self,
        cashier_id: i64,
        checkout_key: &str,
        lines: &[SaleLine],
        tax_basis_points: i64,
        now: NaiveDateTime,
    ) -> Result<SaleRecord, InvenError> {
        if lines.is_empty() {
            return Err(InvenError::validation("cart", "cart is empty"));
        }
        let threshold = self.low_stock_threshold();
        let mut tx = self.pool().begin().await?;

        // Write first so the connection holds the write lock for the rest of the sale.
        let inserted = sqlx::query(
            r#"INSERT INTO transactions (checkout_key, cashier_id, created_at, payment_status)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(checkout_key) DO NOTHING"#,
        )
        .bind(checkout_key)
        .bind(cashier_id)
        .bind(now)
        .bind(PaymentStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return self
                .replay_sale(cashier_id, checkout_key)
                .await?
                .ok_or_else(|| InvenError::not_found(format!("checkout {checkout_key}")));
        }
        let transaction_id = inserted.last_insert_rowid();

        let mut subtotal = Cents::ZERO;
        let mut low_stock = Vec::new();
        for line in lines {
            if line.quantity <= 0 {
                return Err(InvenError::validation(
                    "quantity",
                    format!("quantity for product {} must be positive", line.product_id),
                ));
            }
            let product: Option<(String, String, Cents, i64)> = sqlx::query_as(
                "SELECT name, category, price_cents, stock_quantity FROM products WHERE id = ?",
            )
            .bind(line.product_id)
            .fetch_optional(&mut *tx)
            .await?;
            let Some((name, category, price, _)) = product else {
                return Err(InvenError::not_found(format!("product {}", line.product_id)));
            };

            let deducted = sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - ? WHERE id = ? AND stock_quantity >= ?",
            )
            .bind(line.quantity)
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
            if deducted.rows_affected() == 0 {
                let (available,): (i64,) =
                    sqlx::query_as("SELECT stock_quantity FROM products WHERE id = ?")
                        .bind(line.product_id)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(InvenError::InsufficientStock {
                    product: name,
                    available,
                });
            }
            refresh_status(&mut tx, line.product_id, threshold).await?;

            sqlx::query(
                r#"INSERT INTO transaction_details
                       (transaction_id, product_id, product_name, category, quantity, unit_price_cents)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(transaction_id)
            .bind(line.product_id)
            .bind(&name)
            .bind(&category)
            .bind(line.quantity)
            .bind(price)
            .execute(&mut *tx)
            .await?;

            subtotal = subtotal.checked_add(price.times(line.quantity)?)?;

            let (remaining,): (i64,) =
                sqlx::query_as("SELECT stock_quantity FROM products WHERE id = ?")
                    .bind(line.product_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if remaining <= threshold {
                low_stock.push(LowStockItem {
                    product_id: line.product_id,
                    product_name: name,
                    stock_quantity: remaining,
                });
            }
        }

        let tax = subtotal.tax(tax_basis_points)?;
        sqlx::query(
            "UPDATE transactions SET subtotal_cents = ?, tax_cents = ?, total_cents = ? WHERE id = ?",
        )
        .bind(subtotal)
        .bind(tax)
        .bind(subtotal.checked_add(tax)?)
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let transaction = self.get_transaction(transaction_id).await?;
        let details = self.transaction_details(transaction_id).await?;
        Ok(SaleRecord {
            transaction,
            details,
            low_stock,
            replayed: false,
        })
    }

    /// The sale this cashier already recorded under `checkout_key`. A key
    /// recorded by anyone else is a conflict, never a replay.
    pub async fn replay_sale(
        &self,
        cashier_id: i64,
        checkout_key: &str,
    ) -> Result<Option<SaleRecord>, InvenError> {
        let Some(transaction) = self.transaction_by_key(checkout_key).await? else {
            return Ok(None);
        };
        if transaction.cashier_id != Some(cashier_id) {
            return Err(InvenError::Conflict(format!(
                "checkout key '{checkout_key}' was already used for another sale"
            )));
        }
        let details = self.transaction_details(transaction.id).await?;
        Ok(Some(SaleRecord {
            transaction,
            details,
            low_stock: Vec::new(),
            replayed: true,
        }))
    }

    pub async fn get_transaction(&self, id: i64) -> Result<DbTransaction, InvenError> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?");
        sqlx::query_as::<_, DbTransaction>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| InvenError::not_found(format!("transaction {id}")))
    }

    pub async fn transaction_by_key(&self, key: &str) -> Result<Option<DbTransaction>, InvenError> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE checkout_key = ?");
        let row = sqlx::query_as::<_, DbTransaction>(&query)
            .bind(key)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    pub async fn transaction_details(
        &self,
        transaction_id: i64,
    ) -> Result<Vec<DbTransactionDetail>, InvenError> {
        let rows = sqlx::query_as::<_, DbTransactionDetail>(
            r#"SELECT id, transaction_id, product_id, product_name, category, quantity, unit_price_cents
               FROM transaction_details WHERE transaction_id = ? ORDER BY id"#,
        )
        .bind(transaction_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Mark a pending transaction paid, storing card details in the same commit.
    pub async fn settle_payment(
        &self,
        transaction_id: i64,
        settlement: &Settlement,
        card: Option<&CardRecord>,
        now: NaiveDateTime,
    ) -> Result<DbTransaction, InvenError> {
        let mut tx = self.pool().begin().await?;
        let done = sqlx::query(
            r#"UPDATE transactions SET
                   payment_status = ?, payment_method = ?, tendered_cents = ?, change_cents = ?, paid_at = ?
               WHERE id = ? AND payment_status = ?"#,
        )
        .bind(PaymentStatus::Paid)
        .bind(settlement.method)
        .bind(settlement.tendered)
        .bind(settlement.change)
        .bind(now)
        .bind(transaction_id)
        .bind(PaymentStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if done.rows_affected() == 0 {
            tx.rollback().await?;
            // Distinguish "already paid" from "no such transaction".
            self.get_transaction(transaction_id).await?;
            return Err(InvenError::PaymentAlreadyMade(transaction_id));
        }

        if let Some(card) = card {
            sqlx::query(
                r#"INSERT INTO card_payments
                       (transaction_id, cardholder_hash, card_hash, expiry_hash, card_last4, paid_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(transaction_id)
            .bind(&card.cardholder_hash)
            .bind(&card.card_hash)
            .bind(&card.expiry_hash)
            .bind(&card.card_last4)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get_transaction(transaction_id).await
    }

    pub async fn card_last4(&self, transaction_id: i64) -> Result<Option<String>, InvenError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT card_last4 FROM card_payments WHERE transaction_id = ?")
                .bind(transaction_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(l,)| l))
    }
}
