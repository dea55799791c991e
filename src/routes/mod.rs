//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  routing::{get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  services::{ServeDir, ServeFile},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws?session=<id>`
/// - session and dashboard API under `/api/v1/...`
/// - static SPA from `./static` with index fallback
/// - permissive CORS and per-request trace spans
pub fn build_router(state: Arc<AppState>) -> Router {
  let static_service = ServeDir::new("./static")
    .append_index_html_on_directories(true)
    .not_found_service(ServeFile::new("./static/index.html"));

  Router::new()
    .route("/ws", get(ws::ws_upgrade))
    .route("/api/v1/health", get(http::http_health))
    // Interviewee session
    .route("/api/v1/sessions", post(http::http_open_session))
    .route("/api/v1/sessions/:id", get(http::http_get_session))
    .route("/api/v1/sessions/:id/resume-upload", post(http::http_resume_upload))
    .route("/api/v1/sessions/:id/profile", post(http::http_profile_field))
    .route("/api/v1/sessions/:id/start", post(http::http_start))
    .route("/api/v1/sessions/:id/answer", post(http::http_answer))
    .route("/api/v1/sessions/:id/draft", post(http::http_draft))
    .route("/api/v1/sessions/:id/pause", post(http::http_pause))
    .route("/api/v1/sessions/:id/resume", post(http::http_resume))
    .route("/api/v1/sessions/:id/teardown", post(http::http_teardown))
    .route("/api/v1/sessions/:id/welcome-back", post(http::http_welcome_back))
    // Interviewer dashboard
    .route("/api/v1/candidates", get(http::http_list_candidates))
    .route("/api/v1/candidates/:id", get(http::http_candidate_detail))
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
    .fallback_service(static_service)
}
