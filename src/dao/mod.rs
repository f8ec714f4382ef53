/// Room-to-server routing table.
pub mod assignment;
/// Game record storage and retrieval operations.
pub mod game_store;
/// Database model definitions.
pub mod models;
/// Signed URLs for candidate pictures.
pub mod pictures;
/// Storage abstraction layer for database operations.
pub mod storage;
