//! Fleet router entrypoint: creates games and pins each room to the least-loaded server.

use std::sync::Arc;

use anyhow::Context;
use rankrat_back::{
    bootstrap,
    config::{self, AppConfig},
    dao::{
        assignment::RedisAssignmentStore,
        game_store::{StoreBackend, connector},
    },
    routes,
    services::{fleet_service::HttpLoadProbe, storage_supervisor},
    state::{fleet::FleetState, storage::StorageSlot},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_tracing();

    let config = AppConfig::load();
    let servers = config::fleet_servers_from_env();
    if servers.is_empty() {
        warn!("no fleet servers configured; game creation will fail");
    }
    info!(servers = servers.len(), "starting fleet router");

    let assignments = RedisAssignmentStore::from_env()
        .await
        .context("connecting to the routing table")?
        .with_write_timeout(config.status_timeout);

    let backend = StoreBackend::from_env();
    let storage = Arc::new(StorageSlot::new());
    tokio::spawn(storage_supervisor::run(storage.clone(), connector(backend)));

    let probe = Arc::new(HttpLoadProbe::new(config.status_timeout));
    let state = FleetState::new(
        config,
        storage,
        Arc::new(assignments),
        bootstrap::picture_signer_from_env(),
        probe,
        servers,
    );
    let port = config::port_from_env(config::DEFAULT_ROUTER_PORT);

    bootstrap::serve(routes::fleet_router(state), port).await
}
