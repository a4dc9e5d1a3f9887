//! Field rules shared by registration, profile edits, the catalog and card payments.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::InvenError;
use crate::types::Cents;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("valid username regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{10,15}$").expect("valid phone regex"));
static CARDHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z ]{2,50}$").expect("valid cardholder regex"));
static EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2})$").expect("valid expiry regex"));

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_USERNAME_LEN: usize = 3;
/// RM 1,000,000.00
pub const MAX_PRICE_CENTS: i64 = 100_000_000;
pub const MAX_STOCK: i64 = 1_000_000;

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, InvenError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InvenError::validation(field, "is required"));
    }
    Ok(value)
}

pub fn validate_password(password: &str) -> Result<(), InvenError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(InvenError::validation(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters long"),
        ));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(InvenError::validation("password", "must contain at least one letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(InvenError::validation("password", "must contain at least one digit"));
    }
    if !password.chars().any(|c| !c.is_alphanumeric() || c == '_') {
        return Err(InvenError::validation("password", "must contain at least one symbol"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), InvenError> {
    let username = required("username", username)?;
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(InvenError::validation(
            "username",
            format!("must be at least {MIN_USERNAME_LEN} characters long"),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(InvenError::validation(
            "username",
            "may contain only letters, digits and underscores",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), InvenError> {
    let email = required("email", email)?;
    if !EMAIL_RE.is_match(email) {
        return Err(InvenError::validation("email", "is not a valid e-mail address"));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), InvenError> {
    let phone = required("phone", phone)?;
    if !PHONE_RE.is_match(phone) {
        return Err(InvenError::validation("phone", "must be 10 to 15 digits"));
    }
    Ok(())
}

pub fn validate_price(price: Cents) -> Result<(), InvenError> {
    if price.value() <= 0 {
        return Err(InvenError::validation("price", "must be greater than zero"));
    }
    if price.value() > MAX_PRICE_CENTS {
        return Err(InvenError::validation(
            "price",
            format!("cannot exceed {}", Cents(MAX_PRICE_CENTS)),
        ));
    }
    Ok(())
}

pub fn validate_stock(stock: i64) -> Result<(), InvenError> {
    if stock < 0 {
        return Err(InvenError::validation("stock_quantity", "cannot be negative"));
    }
    if stock > MAX_STOCK {
        return Err(InvenError::validation(
            "stock_quantity",
            format!("cannot exceed {MAX_STOCK}"),
        ));
    }
    Ok(())
}

pub fn validate_product(name: &str, category: &str, price: Cents, stock: i64) -> Result<(), InvenError> {
    required("name", name)?;
    required("category", category)?;
    validate_price(price)?;
    validate_stock(stock)
}

pub fn validate_cardholder(name: &str) -> Result<(), InvenError> {
    if !CARDHOLDER_RE.is_match(name.trim()) {
        return Err(InvenError::validation(
            "cardholder",
            "must be 2 to 50 letters or spaces",
        ));
    }
    Ok(())
}

/// Returns the card number with spaces removed.
pub fn normalize_card_number(number: &str) -> Result<String, InvenError> {
    let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != 16 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(InvenError::validation("number", "card number must be 16 digits"));
    }
    Ok(digits)
}

/// `MM/YY`; a card stays valid through the last day of its expiry month.
pub fn validate_expiry(expiry: &str, today: NaiveDate) -> Result<(), InvenError> {
    let caps = EXPIRY_RE
        .captures(expiry.trim())
        .ok_or_else(|| InvenError::validation("expiry", "must be in MM/YY format"))?;
    let month: u32 = caps[1]
        .parse()
        .map_err(|_| InvenError::validation("expiry", "must be in MM/YY format"))?;
    let year: i32 = caps[2]
        .parse()
        .map_err(|_| InvenError::validation("expiry", "must be in MM/YY format"))?;
    if !(1..=12).contains(&month) {
        return Err(InvenError::validation("expiry", "month must be between 01 and 12"));
    }
    if (2000 + year, month) < (today.year(), today.month()) {
        return Err(InvenError::validation("expiry", "card has expired"));
    }
    Ok(())
}

pub fn validate_cvv(cvv: &str) -> Result<(), InvenError> {
    let cvv = cvv.trim();
    if cvv.len() != 3 || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(InvenError::validation("cvv", "must be 3 digits"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: InvenError) -> &'static str {
        match err {
            InvenError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn password_rules_name_the_missing_class() {
        assert!(validate_password("abc1!def").is_ok());
        assert!(validate_password("under_score9").is_ok());
        let err = validate_password("abcdefg1").unwrap_err();
        assert!(err.to_string().contains("symbol"));
        let err = validate_password("!!!!!!!!1").unwrap_err();
        assert!(err.to_string().contains("letter"));
        let err = validate_password("a1!").unwrap_err();
        assert!(err.to_string().contains("at least 8"));
    }

    #[test]
    fn identity_fields() {
        assert!(validate_username("cashier_01").is_ok());
        assert_eq!(field_of(validate_username("ab").unwrap_err()), "username");
        assert!(validate_username("bad name").is_err());

        assert!(validate_email("a.b+c@shop.com.my").is_ok());
        assert!(validate_email("no-at-sign.com").is_err());

        assert!(validate_phone("+60123456789").is_ok());
        assert!(validate_phone("012-3456789").is_err());
        assert!(validate_phone("123456789").is_err());
    }

    #[test]
    fn card_rules() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(validate_cardholder("Siti Aminah").is_ok());
        assert!(validate_cardholder("J").is_err());
        assert!(validate_cardholder("R2D2").is_err());

        assert_eq!(
            normalize_card_number("4111 1111 1111 1111").unwrap(),
            "4111111111111111"
        );
        assert!(normalize_card_number("4111 1111 1111").is_err());

        assert!(validate_expiry("10/26", today).is_ok());
        assert!(validate_expiry("09/26", today).is_err());
        assert!(validate_expiry("13/30", today).is_err());
        assert!(validate_expiry("1/30", today).is_err());

        assert!(validate_cvv("123").is_ok());
        assert!(validate_cvv("12a").is_err());
    }

    #[test]
    fn product_rules() {
        assert!(validate_product("Pen", "Stationery", Cents(100), 0).is_ok());
        assert_eq!(
            field_of(validate_product("Pen", "Stationery", Cents(0), 1).unwrap_err()),
            "price"
        );
        assert_eq!(
            field_of(validate_product(" ", "Stationery", Cents(10), 1).unwrap_err()),
            "name"
        );
        assert_eq!(
            field_of(validate_product("Pen", "Stationery", Cents(10), -1).unwrap_err()),
            "stock_quantity"
        );
        assert!(validate_product("Pen", "Stationery", Cents(MAX_PRICE_CENTS), MAX_STOCK).is_ok());
        let err = validate_product("Pen", "Stationery", Cents(100_000_000_000_000_000), 1).unwrap_err();
        assert_eq!(err.to_string(), "price: cannot exceed 1000000.00");
        assert_eq!(
            field_of(validate_product("Pen", "Stationery", Cents(10), MAX_STOCK + 1).unwrap_err()),
            "stock_quantity"
        );
    }
}
