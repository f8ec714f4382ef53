use axum::Router;

use crate::state::{SharedState, fleet::SharedFleetState};

/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Game lifecycle routes of the fleet router.
pub mod fleet;
/// Health checks.
pub mod health;
/// Load reporting.
pub mod traffic;
/// Player session upgrade.
pub mod websocket;

/// Routes of a game server: sessions, traffic and health.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(traffic::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}

/// Routes of the fleet router: game lifecycle and health.
pub fn fleet_router(state: SharedFleetState) -> Router<()> {
    health::fleet_router()
        .merge(fleet::router())
        .merge(docs::fleet_router())
        .with_state(state)
}
