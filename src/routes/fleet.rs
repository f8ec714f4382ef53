use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{any, get, post},
};
use axum_valid::Valid;

use crate::{
    dto::game::{
        CreateGameRequest, CreateGameResponse, FetchGameResponse, GameExistsRequest,
        GameExistsResponse, PresignUploadRequest, PresignUploadResponse, RandomCodeResponse,
    },
    error::AppError,
    services::game_service,
    state::fleet::SharedFleetState,
};

/// Game lifecycle routes of the fleet router.
pub fn router() -> Router<SharedFleetState> {
    Router::new()
        .route("/create-game", post(create_game))
        .route("/generate-random-code", get(generate_random_code))
        .route("/does-game-exist", post(does_game_exist))
        .route("/fetch-game/{room_id}", get(fetch_game))
        .route("/pictures/presign-upload", post(presign_upload))
        // Sessions are served by the game servers; the load balancer routes them there.
        .route("/ws/{*room_path}", any(session_not_here))
}

async fn session_not_here() -> AppError {
    AppError::NotFound("game not found".into())
}

/// Pin a new game to the least-loaded server, then store it.
#[utoipa::path(
    post,
    path = "/create-game",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game stored", body = CreateGameResponse),
        (status = 400, description = "Missing name, room code, questions or candidates"),
        (status = 409, description = "Room code already taken"),
        (status = 503, description = "No server available or storage unavailable")
    )
)]
pub async fn create_game(
    State(state): State<SharedFleetState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<CreateGameResponse>), AppError> {
    let room_id = game_service::create_game(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateGameResponse::stored(&room_id)),
    ))
}

/// Suggest a room code no stored game uses yet.
#[utoipa::path(
    get,
    path = "/generate-random-code",
    tag = "game",
    responses((status = 200, description = "Unused room code", body = RandomCodeResponse))
)]
pub async fn generate_random_code(
    State(state): State<SharedFleetState>,
) -> Result<Json<RandomCodeResponse>, AppError> {
    let code = game_service::generate_room_code(&state).await?;
    Ok(Json(RandomCodeResponse::ok(code)))
}

/// Tell whether a room code is taken.
#[utoipa::path(
    post,
    path = "/does-game-exist",
    tag = "game",
    request_body = GameExistsRequest,
    responses((status = 200, description = "Whether the room is taken", body = GameExistsResponse))
)]
pub async fn does_game_exist(
    State(state): State<SharedFleetState>,
    Valid(Json(payload)): Valid<Json<GameExistsRequest>>,
) -> Result<Json<GameExistsResponse>, AppError> {
    let exists = game_service::game_exists(&state, &payload.room_id).await?;
    Ok(Json(GameExistsResponse::ok(exists)))
}

/// Full game record, leaderboard included, with signed picture URLs.
#[utoipa::path(
    get,
    path = "/fetch-game/{room_id}",
    tag = "game",
    params(("room_id" = String, Path, description = "Room code of the game")),
    responses(
        (status = 200, description = "Game record", body = FetchGameResponse),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn fetch_game(
    State(state): State<SharedFleetState>,
    Path(room_id): Path<String>,
) -> Result<Json<FetchGameResponse>, AppError> {
    let game = game_service::fetch_game(&state, &room_id).await?;
    Ok(Json(FetchGameResponse::ok(game)))
}

#[utoipa::path(
    post,
    path = "/pictures/presign-upload",
    tag = "pictures",
    request_body = PresignUploadRequest,
    responses(
        (status = 200, description = "Presigned PUT URL", body = PresignUploadResponse),
        (status = 400, description = "Missing key")
    )
)]
pub async fn presign_upload(
    State(state): State<SharedFleetState>,
    Valid(Json(payload)): Valid<Json<PresignUploadRequest>>,
) -> Result<Json<PresignUploadResponse>, AppError> {
    let signed_url =
        game_service::presign_upload(&state, &payload.key, payload.content_type.as_deref())?;
    Ok(Json(PresignUploadResponse::ok(signed_url)))
}
