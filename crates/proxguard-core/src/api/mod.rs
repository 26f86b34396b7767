//! REST and WebSocket adapter over the core dispatcher.
//!
//! Transport mapping is intentionally thin: every endpoint delegates to
//! a [`Dispatcher`](crate::dispatcher::Dispatcher) entry point.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/ingest` — sensor packet ingestion
//! - `POST /api/v1/devices/:id/register` — skeleton registration
//! - `DELETE /api/v1/devices/:id` — disconnect
//! - `GET /api/v1/devices` — active device list
//! - `GET /api/v1/devices/:id` — one device
//! - `GET /api/v1/summary` — store summary
//! - `GET /api/v1/alerts/scan` — raw proximity events
//! - `GET /health` — liveness
//! - `WS /ws/stream` — real-time position and alert stream

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Create the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/ingest", post(handlers::ingest))
        .route("/api/v1/devices", get(handlers::list_devices))
        .route(
            "/api/v1/devices/:id",
            get(handlers::get_device).delete(handlers::disconnect),
        )
        .route("/api/v1/devices/:id/register", post(handlers::register))
        .route("/api/v1/summary", get(handlers::summary))
        .route("/api/v1/alerts/scan", get(handlers::scan_alerts))
        .route("/health", get(handlers::health))
        .route("/ws/stream", get(websocket::ws_handler))
        .with_state(state)
}
