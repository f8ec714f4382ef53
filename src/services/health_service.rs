use tracing::warn;

use crate::{
    dto::health::HealthResponse,
    state::{SharedState, storage::StorageSlot},
};

/// Health of the game store, logging connectivity issues.
pub async fn storage_health(storage: &StorageSlot) -> HealthResponse {
    match storage.require_game_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    HealthResponse::new(storage.is_degraded().await)
}

/// Game server health, including its fleet name and the number of cached rooms.
pub async fn server_health(state: &SharedState) -> HealthResponse {
    storage_health(state.storage())
        .await
        .with_server(state.config().server_name.as_str())
        .with_cached_rooms(state.cache().len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{game_store::memory::InMemoryGameStore, pictures::DisabledPictureSigner},
        state::AppState,
    };

    #[tokio::test]
    async fn empty_slot_reports_degraded() {
        let response = storage_health(&StorageSlot::new()).await;
        assert_eq!(response.status, "degraded");
        assert_eq!(response.server, None);
        assert_eq!(response.cached_rooms, None);
    }

    #[tokio::test]
    async fn server_health_names_the_server() {
        let state = AppState::new(
            AppConfig {
                server_name: "server2".into(),
                ..AppConfig::default()
            },
            Arc::new(StorageSlot::with_store(Arc::new(InMemoryGameStore::new()))),
            Arc::new(DisabledPictureSigner),
        );

        let response = server_health(&state).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.server.as_deref(), Some("server2"));
        assert_eq!(response.cached_rooms, Some(0));
    }
}
