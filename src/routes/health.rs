use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::health::HealthResponse,
    services::health_service,
    state::{SharedState, fleet::SharedFleetState},
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Server status", body = HealthResponse))
)]
/// Health of a game server and its storage.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::server_health(&state).await)
}

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Router status", body = HealthResponse))
)]
/// Health of the fleet router and its storage.
pub async fn fleet_healthcheck(State(state): State<SharedFleetState>) -> Json<HealthResponse> {
    Json(health_service::storage_health(state.storage()).await)
}

/// Health route of the game server.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/healthcheck", get(healthcheck))
}

/// Health route of the fleet router.
pub fn fleet_router() -> Router<SharedFleetState> {
    Router::<SharedFleetState>::new().route("/healthcheck", get(fleet_healthcheck))
}
