/// OpenAPI documents of both binaries.
pub mod documentation;
/// Least-loaded server selection and room assignment.
pub mod fleet_service;
/// Game creation, lookup and picture uploads.
pub mod game_service;
/// Health payloads.
pub mod health_service;
/// Background persistence of rating batches.
pub mod persistence;
/// Bradley-Terry rating adjustments.
pub mod rating_engine;
/// Vote validation and leaderboard updates.
pub mod rating_service;
/// Room resolution and round sampling.
pub mod room_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// Player WebSocket sessions.
pub mod websocket_service;
