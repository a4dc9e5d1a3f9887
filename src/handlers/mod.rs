//! axum handlers, one module per API area. Role checks happen here; the
//! services below assume an authorised caller.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod reports;
pub mod sales;
pub mod scan;
pub mod users;
