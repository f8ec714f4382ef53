//! Game server entrypoint: player sessions over WebSocket, traffic reporting and health.

use std::sync::Arc;

use rankrat_back::{
    bootstrap,
    config::{self, AppConfig},
    dao::game_store::{StoreBackend, connector},
    routes,
    services::storage_supervisor,
    state::{AppState, storage::StorageSlot},
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_tracing();

    let config = AppConfig {
        server_name: config::server_name_from_env(),
        ..AppConfig::load()
    };
    let backend = StoreBackend::from_env();
    info!(server = %config.server_name, ?backend, "starting game server");

    let storage = Arc::new(StorageSlot::new());
    tokio::spawn(storage_supervisor::run(storage.clone(), connector(backend)));

    let state = AppState::new(config, storage, bootstrap::picture_signer_from_env());
    let port = config::port_from_env(config::DEFAULT_SERVER_PORT);

    bootstrap::serve(routes::router(state), port).await
}
