//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (inbound events + `quest-updated` broadcasts)
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) for the desktop client and extension
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Generation
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/quests/generate", post(http::http_generate_quest))
        .route("/api/v1/feedback", post(http::http_post_feedback))
        .route("/api/v1/hints", post(http::http_post_hints))
        .route("/api/v1/arrangement", post(http::http_post_arrangement))
        // Quest lifecycle
        .route("/api/v1/quests", get(http::http_list_quests))
        .route("/api/v1/quests/stats", get(http::http_quest_stats))
        .route("/api/v1/quests/:id", get(http::http_get_quest).delete(http::http_delete_quest))
        .route("/api/v1/quests/:id/start", post(http::http_start_quest))
        .route("/api/v1/quests/:id/pause", post(http::http_pause_quest))
        .route("/api/v1/quests/:id/resume", post(http::http_resume_quest))
        .route("/api/v1/quests/:id/steps/:step_id", put(http::http_set_step_completion))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
