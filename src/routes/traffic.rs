use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::traffic::TrafficResponse, state::SharedState};

#[utoipa::path(
    get,
    path = "/get-traffic",
    tag = "fleet",
    responses((status = 200, description = "Live session count", body = TrafficResponse))
)]
/// Report how many player sessions this server holds.
pub async fn get_traffic(State(state): State<SharedState>) -> Json<TrafficResponse> {
    Json(TrafficResponse::ok(state.live_sessions()))
}

/// Route reporting the load of this server.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/get-traffic", get(get_traffic))
}
