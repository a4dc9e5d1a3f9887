use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &inventrack::config::CONFIG;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.storage.database_url,
        cart_path = %cfg.storage.cart_path.display(),
        loglevel = %cfg.basic.loglevel,
        low_stock_threshold = cfg.inventory.low_stock_threshold,
        tax_rate_basis_points = cfg.inventory.tax_rate_basis_points,
        scanner = cfg.scanner.enabled
    );

    let state = inventrack::AppState::build(cfg).await?;
    match state.storage.sync_alerts(inventrack::types::local_now()).await {
        Ok(sync) => info!(opened = sync.opened, resolved = sync.resolved, "stock alerts synced"),
        Err(e) => warn!(error = %e, "initial stock alert sync failed"),
    }
    let app = inventrack::app_router(state);

    let addr = format!("{}:{}", cfg.basic.listen_addr, cfg.basic.listen_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
