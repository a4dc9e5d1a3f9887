use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::{DbTransaction, PaymentMethod, PaymentStatus};
use crate::db::sales::{CardRecord, Settlement};
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::service::passwords::hash_secret;
use crate::service::validation::{
    normalize_card_number, validate_cardholder, validate_cvv, validate_expiry,
};
use crate::types::{Cents, local_now};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentRequest {
    Cash {
        tendered_cents: Cents,
    },
    Card {
        cardholder: String,
        number: String,
        expiry: String,
        cvv: String,
        amount_cents: Cents,
    },
    EWallet {
        #[serde(default)]
        reference: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptLine {
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: Cents,
    pub line_total_cents: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub transaction_id: i64,
    pub cashier: String,
    pub created_at: NaiveDateTime,
    pub paid_at: Option<NaiveDateTime>,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub card_last4: Option<String>,
    pub lines: Vec<ReceiptLine>,
    pub subtotal_cents: Cents,
    pub tax_cents: Cents,
    pub total_cents: Cents,
    pub tendered_cents: Option<Cents>,
    pub change_cents: Option<Cents>,
}

impl Receipt {
    /// Plain-text slip, amounts prefixed with `currency`.
    pub fn render_text(&self, currency: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "InvenTrack receipt #{}", self.transaction_id);
        let _ = writeln!(out, "Cashier: {}", self.cashier);
        let _ = writeln!(out, "Date: {}", self.created_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "{}", "-".repeat(40));
        for line in &self.lines {
            let _ = writeln!(
                out,
                "{:<22} {:>3} x {:>8}",
                line.product_name, line.quantity, line.unit_price_cents
            );
            let _ = writeln!(out, "{:>40}", format!("{currency} {}", line.line_total_cents));
        }
        let _ = writeln!(out, "{}", "-".repeat(40));
        let _ = writeln!(out, "{:<20}{:>20}", "Subtotal", format!("{currency} {}", self.subtotal_cents));
        let _ = writeln!(out, "{:<20}{:>20}", "Tax", format!("{currency} {}", self.tax_cents));
        let _ = writeln!(out, "{:<20}{:>20}", "Total", format!("{currency} {}", self.total_cents));
        match self.payment_method {
            Some(method) => {
                let label = match method {
                    PaymentMethod::Cash => "Cash".to_string(),
                    PaymentMethod::Card => match &self.card_last4 {
                        Some(last4) => format!("Card **** {last4}"),
                        None => "Card".to_string(),
                    },
                    PaymentMethod::EWallet => "E-wallet".to_string(),
                };
                let _ = writeln!(out, "{:<20}{:>20}", "Paid by", label);
            }
            None => {
                let _ = writeln!(out, "{:<20}{:>20}", "Status", "UNPAID");
            }
        }
        if let Some(tendered) = self.tendered_cents {
            let _ = writeln!(out, "{:<20}{:>20}", "Tendered", format!("{currency} {tendered}"));
        }
        if let Some(change) = self.change_cents {
            let _ = writeln!(out, "{:<20}{:>20}", "Change", format!("{currency} {change}"));
        }
        out
    }
}

#[derive(Clone)]
pub struct PaymentService {
    storage: InventoryStorage,
}

impl PaymentService {
    pub fn new(storage: InventoryStorage) -> Self {
        Self { storage }
    }

    pub async fn pay(
        &self,
        transaction_id: i64,
        request: PaymentRequest,
    ) -> Result<DbTransaction, InvenError> {
        let transaction = self.storage.get_transaction(transaction_id).await?;
        if transaction.payment_status == PaymentStatus::Paid {
            return Err(InvenError::PaymentAlreadyMade(transaction_id));
        }
        let total = transaction.total_cents;
        let now = local_now();

        let (settlement, card) = match request {
            PaymentRequest::Cash { tendered_cents } => {
                if tendered_cents.value() <= 0 {
                    return Err(InvenError::validation("tendered_cents", "must be greater than zero"));
                }
                if tendered_cents < total {
                    return Err(InvenError::InsufficientPayment {
                        remaining: total - tendered_cents,
                    });
                }
                let settlement = Settlement {
                    method: PaymentMethod::Cash,
                    tendered: Some(tendered_cents),
                    change: Some(tendered_cents - total),
                };
                (settlement, None)
            }
            PaymentRequest::Card {
                cardholder,
                number,
                expiry,
                cvv,
                amount_cents,
            } => {
                validate_cardholder(&cardholder)?;
                let digits = normalize_card_number(&number)?;
                validate_expiry(&expiry, now.date())?;
                validate_cvv(&cvv)?;
                if amount_cents != total {
                    return Err(InvenError::validation(
                        "amount_cents",
                        format!("card amount must equal the total of {total}"),
                    ));
                }
                let card_last4 = digits[digits.len() - 4..].to_string();
                let record = CardRecord {
                    cardholder_hash: hash_secret(cardholder.trim().to_string()).await?,
                    card_hash: hash_secret(digits).await?,
                    expiry_hash: hash_secret(expiry.trim().to_string()).await?,
                    card_last4,
                };
                let settlement = Settlement {
                    method: PaymentMethod::Card,
                    tendered: Some(total),
                    change: None,
                };
                (settlement, Some(record))
            }
            PaymentRequest::EWallet { reference } => {
                info!(transaction_id, reference = ?reference, "e-wallet payment confirmed");
                let settlement = Settlement {
                    method: PaymentMethod::EWallet,
                    tendered: Some(total),
                    change: None,
                };
                (settlement, None)
            }
        };

        let paid = self
            .storage
            .settle_payment(transaction_id, &settlement, card.as_ref(), now)
            .await?;
        info!(
            transaction_id,
            method = ?settlement.method,
            total = %paid.total_cents,
            "payment settled"
        );
        Ok(paid)
    }

    pub async fn receipt(&self, transaction_id: i64) -> Result<Receipt, InvenError> {
        let t = self.storage.get_transaction(transaction_id).await?;
        let details = self.storage.transaction_details(transaction_id).await?;
        let cashier = match t.cashier_id {
            Some(id) => match self.storage.get_user(id).await {
                Ok(user) => user.username,
                Err(InvenError::NotFound(_)) => "(deleted)".to_string(),
                Err(e) => return Err(e),
            },
            None => "(deleted)".to_string(),
        };
        let card_last4 = if t.payment_method == Some(PaymentMethod::Card) {
            self.storage.card_last4(transaction_id).await?
        } else {
            None
        };

        Ok(Receipt {
            transaction_id: t.id,
            cashier,
            created_at: t.created_at,
            paid_at: t.paid_at,
            payment_status: t.payment_status,
            payment_method: t.payment_method,
            card_last4,
            lines: details
                .iter()
                .map(|d| {
                    Ok(ReceiptLine {
                        product_name: d.product_name.clone(),
                        quantity: d.quantity,
                        unit_price_cents: d.unit_price_cents,
                        line_total_cents: d.line_total()?,
                    })
                })
                .collect::<Result<Vec<ReceiptLine>, InvenError>>()?,
            subtotal_cents: t.subtotal_cents,
            tax_cents: t.tax_cents,
            total_cents: t.total_cents,
            tendered_cents: t.tendered_cents,
            change_cents: t.change_cents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use crate::db::models::Role;
    use crate::db::products::NewProduct;
    use crate::db::sales::SaleLine;
    use crate::db::test_support::{remove_db_files, temp_storage};
    use crate::db::users::NewUser;

    async fn pending_sale(db: &InventoryStorage, key: &str) -> DbTransaction {
        let now = local_now();
        let cashier = match db.find_user_by_email("pay@shop.my").await.unwrap() {
            Some(u) => u.id,
            None => db
                .insert_user(
                    &NewUser {
                        username: "payer".into(),
                        email: "pay@shop.my".into(),
                        phone: "0129999999".into(),
                        password_hash: "x".into(),
                        role: Role::Cashier,
                    },
                    now,
                )
                .await
                .unwrap(),
        };
        let product = db
            .insert_product(
                &NewProduct {
                    name: format!("Item {key}"),
                    category: "Sports".into(),
                    price_cents: Cents(1000),
                    stock_quantity: 10,
                    barcode: format!("92000000{:04}", key.len() * 7),
                    image_path: None,
                },
                now,
            )
            .await
            .unwrap();
        db.record_sale(
            cashier,
            key,
            &[SaleLine {
                product_id: product.id,
                quantity: 2,
            }],
            600,
            now,
        )
        .await
        .unwrap()
        .transaction
    }

    #[tokio::test]
    async fn cash_needs_enough_and_pays_once() {
        let (db, path) = temp_storage("payment-cash").await;
        let payments = PaymentService::new(db.clone());
        let sale = pending_sale(&db, "c").await;
        assert_eq!(sale.total_cents, Cents(2120));

        let err = payments
            .pay(sale.id, PaymentRequest::Cash { tendered_cents: Cents(0) })
            .await
            .unwrap_err();
        assert!(matches!(err, InvenError::Validation { .. }));

        let err = payments
            .pay(sale.id, PaymentRequest::Cash { tendered_cents: Cents(2000) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient payment: 1.20 still needed");

        let paid = payments
            .pay(sale.id, PaymentRequest::Cash { tendered_cents: Cents(5000) })
            .await
            .unwrap();
        assert_eq!(paid.change_cents, Some(Cents(2880)));

        let err = payments
            .pay(sale.id, PaymentRequest::EWallet { reference: None })
            .await
            .unwrap_err();
        assert!(matches!(err, InvenError::PaymentAlreadyMade(id) if id == sale.id));

        let receipt = payments.receipt(sale.id).await.unwrap();
        let text = receipt.render_text("RM");
        assert!(text.contains("Total"));
        assert!(text.contains("RM 21.20"));
        assert!(text.contains("Change"));
        assert!(text.contains("RM 28.80"));

        db.pool().close().await;
        remove_db_files(&path);
    }

    #[tokio::test]
    async fn card_stores_hashes_and_last_four_only() {
        let (db, path) = temp_storage("payment-card").await;
        let payments = PaymentService::new(db.clone());
        let sale = pending_sale(&db, "card").await;
        let card = |amount: i64, expiry: String| PaymentRequest::Card {
            cardholder: "Ahmad Ali".into(),
            number: "4111 1111 1111 1234".into(),
            expiry,
            cvv: "321".into(),
            amount_cents: Cents(amount),
        };

        let err = payments.pay(sale.id, card(100, "12/99".into())).await.unwrap_err();
        assert!(matches!(err, InvenError::Validation { field: "amount_cents", .. }));

        let today = local_now().date();
        let (year, month) = match today.month() {
            1 => (today.year() - 1, 12),
            m => (today.year(), m - 1),
        };
        let last_month = format!("{month:02}/{:02}", year % 100);
        let err = payments.pay(sale.id, card(2120, last_month)).await.unwrap_err();
        assert!(matches!(err, InvenError::Validation { field: "expiry", .. }));

        // A card is good through the end of its expiry month.
        let this_month = format!("{:02}/{:02}", today.month(), today.year() % 100);
        let paid = payments.pay(sale.id, card(2120, this_month)).await.unwrap();
        assert_eq!(paid.payment_method, Some(PaymentMethod::Card));

        let (holder, number, last4): (String, String, String) = sqlx::query_as(
            "SELECT cardholder_hash, card_hash, card_last4 FROM card_payments WHERE transaction_id = ?",
        )
        .bind(sale.id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert!(holder.starts_with("$argon2"));
        assert!(!number.contains("4111"));
        assert_eq!(last4, "1234");

        let receipt = payments.receipt(sale.id).await.unwrap();
        assert!(receipt.render_text("RM").contains("Card **** 1234"));

        db.pool().close().await;
        remove_db_files(&path);
    }
}
