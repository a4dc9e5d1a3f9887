use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use tracing::info;

use crate::config::Config;
use crate::db::sqlite::InventoryStorage;
use crate::error::InvenError;
use crate::handlers::{auth, cart, catalog, reports, sales, scan, users};
use crate::service::accounts::AccountService;
use crate::service::analytics::AnalyticsService;
use crate::service::cart::CartService;
use crate::service::cart_store::CartStore;
use crate::service::catalog::CatalogService;
use crate::service::checkout::CheckoutService;
use crate::service::payment::PaymentService;
use crate::service::scanner::{self, ScanActorArgs, ScannerHandle};
use crate::service::sessions::SessionStore;

/// Request bodies above this are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub storage: InventoryStorage,
    pub sessions: SessionStore,
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub payments: PaymentService,
    pub analytics: AnalyticsService,
    pub scanner: Option<ScannerHandle>,
    pub currency: Arc<str>,
}

impl AppState {
    /// Open storage, wire the services and start the scan actor.
    pub async fn build(cfg: &Config) -> Result<Self, InvenError> {
        let storage =
            InventoryStorage::connect(&cfg.storage, cfg.inventory.low_stock_threshold).await?;
        Self::with_storage(storage, cfg).await
    }

    pub async fn with_storage(storage: InventoryStorage, cfg: &Config) -> Result<Self, InvenError> {
        let sessions = SessionStore::new();
        let carts = CartService::new(
            storage.clone(),
            CartStore::new(cfg.storage.cart_path.clone()),
            cfg.inventory.tax_rate_basis_points,
        );

        let scanner = if cfg.scanner.enabled {
            let handle = scanner::spawn(ScanActorArgs {
                storage: storage.clone(),
                carts: carts.clone(),
                queue_capacity: cfg.scanner.queue_capacity,
            })
            .await?;
            Some(handle)
        } else {
            info!("barcode scanner endpoint disabled");
            None
        };

        Ok(Self {
            accounts: AccountService::new(storage.clone(), sessions.clone()),
            catalog: CatalogService::new(storage.clone(), cfg.inventory.barcode_length),
            checkout: CheckoutService::new(storage.clone(), carts.clone()),
            payments: PaymentService::new(storage.clone()),
            analytics: AnalyticsService::new(storage.clone()),
            carts,
            sessions,
            storage,
            scanner,
            currency: Arc::from(cfg.inventory.currency.as_str()),
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/profile", get(users::profile).put(users::update_profile))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", delete(users::delete_user))
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::add_category),
        )
        .route(
            "/categories/distribution",
            get(catalog::category_distribution),
        )
        .route(
            "/products",
            get(catalog::search_products).post(catalog::register_product),
        )
        .route(
            "/products/{id}",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route("/products/{id}/restock", post(catalog::restock))
        .route("/products/barcode/{code}", get(catalog::find_by_barcode))
        .route(
            "/products/backfill-barcodes",
            post(catalog::backfill_barcodes),
        )
        .route("/inventory/summary", get(catalog::inventory_summary))
        .route("/cart", get(cart::view_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/{product_id}", put(cart::set_quantity))
        .route("/scan/events", get(scan::drain_events))
        .route("/checkout", post(sales::checkout))
        .route("/transactions", get(sales::transaction_history))
        .route("/transactions/{id}/pay", post(sales::pay))
        .route("/transactions/{id}/receipt", get(sales::receipt))
        .route("/alerts", get(reports::stock_alerts))
        .route("/reports/summary", get(reports::sales_summary))
        .route("/reports/daily", get(reports::daily_summary))
        .route("/reports/recent", get(reports::recent_transactions))
        .route("/reports/trend", get(reports::sales_trend))
        .route("/reports/top-products", get(reports::top_products))
        .route("/reports/categories", get(reports::sales_by_category))
        .route("/reports/forecast", get(reports::stock_forecast));

    let mut router = Router::new()
        .route("/healthz", get(reports::healthz))
        .nest("/api", api);
    if state.scanner.is_some() {
        router = router.route("/scan", get(scan::scan));
    }

    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}
