use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route of both binaries.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" while the game store is unreachable.
    pub status: String,
    /// Fleet name of the answering game server; absent on the fleet router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Rooms held in memory; absent on the fleet router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_rooms: Option<usize>,
}

impl HealthResponse {
    /// Bare status, "degraded" when `degraded`.
    pub fn new(degraded: bool) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_owned(),
            server: None,
            cached_rooms: None,
        }
    }

    /// Attach the name of the answering server.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Attach the number of cached rooms.
    pub fn with_cached_rooms(mut self, cached_rooms: usize) -> Self {
        self.cached_rooms = Some(cached_rooms);
        self
    }
}
