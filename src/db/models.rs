use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::InvenError;
use crate::types::Cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Role {
    Admin,
    Cashier,
    Manager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "Admin",
            Role::Cashier => "Cashier",
            Role::Manager => "Manager",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = InvenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "cashier" => Ok(Role::Cashier),
            "manager" => Ok(Role::Manager),
            _ => Err(InvenError::validation("role", format!("unknown role '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: NaiveDateTime,
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
}

impl From<DbUser> for UserProfile {
    fn from(u: DbUser) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            phone: u.phone,
            role: u.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum StockStatus {
    #[serde(rename = "In Stock")]
    #[sqlx(rename = "In Stock")]
    InStock,
    #[serde(rename = "Low Stock")]
    #[sqlx(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    #[sqlx(rename = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    pub fn from_quantity(quantity: i64, low_stock_threshold: i64) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity <= low_stock_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DbProduct {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub barcode: Option<String>,
    pub price_cents: Cents,
    pub stock_quantity: i64,
    pub image_path: Option<String>,
    pub status: StockStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    EWallet,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DbTransaction {
    pub id: i64,
    pub checkout_key: String,
    pub cashier_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub subtotal_cents: Cents,
    pub tax_cents: Cents,
    pub total_cents: Cents,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub tendered_cents: Option<Cents>,
    pub change_cents: Option<Cents>,
    pub paid_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DbTransactionDetail {
    pub id: i64,
    pub transaction_id: i64,
    pub product_id: Option<i64>,
    pub product_name: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price_cents: Cents,
}

impl DbTransactionDetail {
    pub fn line_total(&self) -> Result<Cents, InvenError> {
        self.unit_price_cents.times(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StockAlert {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub stock_quantity: i64,
    pub alert_status: AlertStatus,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

/// A product left at or below the threshold by a sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowStockItem {
    pub product_id: i64,
    pub product_name: String,
    pub stock_quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_status_uses_one_threshold() {
        assert_eq!(StockStatus::from_quantity(0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_quantity(5, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::from_quantity(6, 5), StockStatus::InStock);
        assert_eq!(StockStatus::from_quantity(-1, 5), StockStatus::OutOfStock);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("cashier".parse::<Role>().unwrap(), Role::Cashier);
        assert_eq!(" Manager ".parse::<Role>().unwrap(), Role::Manager);
        assert!("Select Role".parse::<Role>().is_err());
    }

    #[test]
    fn stock_status_serializes_as_display_label() {
        let json = serde_json::to_string(&StockStatus::OutOfStock).unwrap();
        assert_eq!(json, r#""Out of Stock""#);
    }
}
