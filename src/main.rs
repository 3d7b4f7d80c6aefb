use std::sync::Arc;

use okapi::api::{build_router, start_server, ApiState};
use okapi::observability::init_observability;
use okapi::proxy::ProxyService;
use okapi::services::{ClusterSync, ConfBus, ConfStore, DiscoveryManager, ModuleCatalog, TenantRegistry};
use okapi::storage::{create_pool, SqlConfStore};
use okapi::{AppConfig, Result, APP_NAME, VERSION};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    init_observability(&config.observability)?;

    info!(app_name = APP_NAME, version = VERSION, "Starting Okapi gateway");

    let pool = create_pool(&config.database).await?;
    let store = Arc::new(SqlConfStore::new(pool));

    let catalog = Arc::new(ModuleCatalog::new());
    let tenants = Arc::new(TenantRegistry::new());
    let discovery = Arc::new(DiscoveryManager::new());

    let sync = Arc::new(ClusterSync::new(
        ConfBus::new(),
        store.clone() as Arc<dyn ConfStore>,
        catalog.clone(),
        tenants.clone(),
    ));
    // Populate from the shared store before serving, then follow the bus
    sync.reload().await?;
    sync.clone().spawn();

    let proxy = Arc::new(ProxyService::new(
        catalog.clone(),
        tenants.clone(),
        discovery.clone(),
        config.gateway.okapi_url.clone(),
    ));

    let router = build_router(ApiState { catalog, tenants, discovery, sync, store, proxy });
    start_server(&config.server, router).await
}
