pub mod accounts;
pub mod analytics;
pub mod cart;
pub mod cart_store;
pub mod catalog;
pub mod checkout;
pub mod passwords;
pub mod payment;
pub mod scanner;
pub mod sessions;
pub mod validation;
