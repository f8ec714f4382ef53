use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    dto::validation::validate_room_id,
    error::AppError,
    services::{room_service, websocket_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/ws/{room_id}",
    tag = "session",
    params(("room_id" = String, Path, description = "Room the player joins")),
    responses(
        (status = 101, description = "Switching protocols; rounds follow as JSON text frames"),
        (status = 400, description = "Malformed room id"),
        (status = 404, description = "No game stored under this room id"),
        (status = 503, description = "Storage unavailable")
    )
)]
/// Resolve the room, then upgrade the HTTP connection into a player session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(room_path): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let room_id = room_path.trim_matches('/').trim().to_lowercase();
    validate_room_id(&room_id)
        .map_err(|err| AppError::BadRequest(err.to_string()))?;

    let room = room_service::resolve_room(&state, &room_id).await?;

    Ok(ws
        .on_upgrade(move |socket| websocket_service::handle_socket(state, room_id, room, socket))
        .into_response())
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/{*room_path}", get(ws_handler))
}
