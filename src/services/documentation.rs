use utoipa::OpenApi;

#[derive(OpenApi)]
/// OpenAPI document of a game server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::traffic::get_traffic,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::traffic::TrafficResponse,
            crate::dto::ws::VoteDto,
            crate::dto::ws::RoundMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "fleet", description = "Load reporting for the fleet router"),
        (name = "session", description = "Player voting sessions over WebSocket"),
    )
)]
pub struct ApiDoc;

#[derive(OpenApi)]
/// OpenAPI document of the fleet router.
#[openapi(
    paths(
        crate::routes::health::fleet_healthcheck,
        crate::routes::fleet::create_game,
        crate::routes::fleet::generate_random_code,
        crate::routes::fleet::does_game_exist,
        crate::routes::fleet::fetch_game,
        crate::routes::fleet::presign_upload,
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game creation and lookup"),
        (name = "pictures", description = "Candidate picture uploads"),
    )
)]
pub struct FleetApiDoc;
