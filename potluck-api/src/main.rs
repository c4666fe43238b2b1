use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use potluck_api::{app, worker, AppState, Services, Settings};
use potluck_catalog::InMemoryCatalog;
use potluck_store::checkout::SimulationConfig;
use potluck_store::snapshot::load_menus;
use potluck_store::{Config, LogEventPublisher, MemoryDirectory, MemoryOrderStore, MemoryStatsStore, SimulatedCheckout, SnapshotFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn build_services(config: &Config) -> anyhow::Result<Services> {
    let menus = match &config.storage.menus_file {
        Some(path) if Path::new(path).exists() => load_menus(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load menus from {}: {}", path, e))?,
        Some(path) => {
            tracing::warn!("Menu file {} not found, starting with an empty catalog", path);
            Vec::new()
        }
        None => Vec::new(),
    };
    let catalog = Arc::new(InMemoryCatalog::with_menus(menus));
    tracing::info!(restaurants = catalog.len().await, "Catalog ready");
    for (restaurant, items) in catalog.item_counts().await {
        tracing::debug!(%restaurant, items, "Menu loaded");
    }

    let (orders, stats, directory) = match &config.storage.data_dir {
        Some(dir) => {
            let snapshot_err = |e: Box<dyn std::error::Error + Send + Sync>| anyhow::anyhow!("failed to restore snapshot in {}: {}", dir, e);
            (
                MemoryOrderStore::persistent(SnapshotFile::in_dir(dir, "pending_orders"))
                    .await
                    .map_err(snapshot_err)?,
                MemoryStatsStore::persistent(SnapshotFile::in_dir(dir, "stats"))
                    .await
                    .map_err(snapshot_err)?,
                MemoryDirectory::persistent(SnapshotFile::in_dir(dir, "participants"))
                    .await
                    .map_err(snapshot_err)?,
            )
        }
        None => (MemoryOrderStore::new(), MemoryStatsStore::new(), MemoryDirectory::new()),
    };

    let automation = SimulatedCheckout::new(
        catalog.clone(),
        SimulationConfig {
            tax_rate_bps: config.fulfillment.simulated_tax_rate_bps,
            ..SimulationConfig::default()
        },
    );

    Ok(Services {
        catalog,
        orders: Arc::new(orders),
        stats: Arc::new(stats),
        directory: Arc::new(directory),
        events: Arc::new(LogEventPublisher::new()),
        automation: Arc::new(automation),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "potluck_api=debug,potluck_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Potluck API on port {}", config.server.port);

    let settings = Settings::from_config(&config)?;
    let services = build_services(&config).await?;
    let state = AppState::new(services, settings);

    if let Some(cutoff) = state.settings.policy.cutoff {
        tokio::spawn(worker::start_fulfillment_scheduler(state.clone(), cutoff));
    }

    let shutdown = state.shutdown.clone();
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
