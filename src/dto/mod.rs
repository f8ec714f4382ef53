use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Fleet router game payloads.
pub mod game;
/// Health check payload.
pub mod health;
/// Load report of a game server.
pub mod traffic;
/// Room id validation.
pub mod validation;
/// WebSocket frames.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
