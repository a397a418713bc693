//! # Netly Control Plane
//!
//! The axum wiring for the agent protocol endpoint
//! (`/agent/register`, `/agent/heartbeat`, `/agent/command/result`) and
//! the install-script route onto `netly-core`'s orchestration engine.
//!
//! ## Modules
//!
//! - [`state`]    — shared application state (repositories, engines)
//! - [`handlers`]  — the agent protocol HTTP handlers
//! - [`api`]       — the install-script and `/healthz` routes

pub mod api;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Builds the full control-plane router over the given state. Split out of
/// `main` so integration tests can drive it in-process with
/// `tower::ServiceExt::oneshot` instead of binding a real listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/install.sh", get(api::install_script))
        .route("/agent/register", post(handlers::agent::register))
        .route("/agent/heartbeat", post(handlers::agent::heartbeat))
        .route("/agent/command/result", post(handlers::agent::command_result))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
