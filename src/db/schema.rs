//! SQL DDL for the inventory database.
//! One owner creates every table, idempotently, at startup.

/// Bumped whenever `SQLITE_INIT` changes shape.
pub const SCHEMA_VERSION: &str = "1";

/// Categories seeded into an empty `categories` table.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Electronics", "Furniture", "Sports", "Stationery"];

/// SQLite schema.
/// - money columns are integer cents
/// - timestamps are local `YYYY-MM-DD HH:MM:SS` text, comparable as strings
/// - `transactions.checkout_key` UNIQUE makes checkout idempotent
/// - `transaction_details` keeps name/category/price at sale time
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    phone TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('Admin', 'Cashier', 'Manager')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    barcode TEXT NULL UNIQUE,
    price_cents INTEGER NOT NULL CHECK (price_cents > 0),
    stock_quantity INTEGER NOT NULL CHECK (stock_quantity >= 0),
    image_path TEXT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);
CREATE INDEX IF NOT EXISTS idx_products_stock ON products(stock_quantity);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    checkout_key TEXT NOT NULL UNIQUE,
    cashier_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    subtotal_cents INTEGER NOT NULL DEFAULT 0,
    tax_cents INTEGER NOT NULL DEFAULT 0,
    total_cents INTEGER NOT NULL DEFAULT 0,
    payment_status TEXT NOT NULL DEFAULT 'pending',
    payment_method TEXT NULL,
    tendered_cents INTEGER NULL,
    change_cents INTEGER NULL,
    paid_at TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at);

CREATE TABLE IF NOT EXISTS transaction_details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    product_id INTEGER NULL REFERENCES products(id) ON DELETE SET NULL,
    product_name TEXT NOT NULL,
    category TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price_cents INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_details_transaction ON transaction_details(transaction_id);
CREATE INDEX IF NOT EXISTS idx_details_product ON transaction_details(product_id);

CREATE TABLE IF NOT EXISTS card_payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_id INTEGER NOT NULL UNIQUE REFERENCES transactions(id) ON DELETE CASCADE,
    cardholder_hash TEXT NOT NULL,
    card_hash TEXT NOT NULL,
    expiry_hash TEXT NOT NULL,
    card_last4 TEXT NOT NULL,
    paid_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    alert_type TEXT NOT NULL DEFAULT 'low_stock',
    alert_status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    resolved_at TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_stock_alerts_product ON stock_alerts(product_id, alert_status)
"#;
