pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod types;

pub use db::InventoryStorage;
pub use error::InvenError;
pub use router::{AppState, app_router};
