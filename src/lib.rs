//! Library crate for rankrat-back, exposing modules for binaries and integration tests.

/// Process startup shared by the binaries.
pub mod bootstrap;
/// Runtime configuration.
pub mod config;
/// Storage adapters and persisted models.
pub mod dao;
/// Wire types.
pub mod dto;
/// Service and HTTP errors.
pub mod error;
/// HTTP and WebSocket routers.
pub mod routes;
/// Domain logic behind the routes.
pub mod services;
/// Shared runtime state.
pub mod state;
