//! Timed interview backend
//!
//! - Axum HTTP + WebSocket API for interview sessions and the reviewer dashboard
//! - Optional OpenAI integration for question generation and scoring (env)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   STORE_PATH        : JSON file for candidate records (default: in memory)
//!   TICK_INTERVAL_MS  : timer tick, 250..=500 (default 500)
//!   QUESTION_ATTEMPTS : provider attempts before the fallback bank (default 2)
//!   SESSION_IDLE_MS   : idle session is paused and dropped after this (default 60000)
//!   OPENAI_API_KEY    : enables OpenAI integration if present
//!   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
//!   OPENAI_MODEL      : default "gpt-4.1-mini"
//!   AGENT_CONFIG_PATH : TOML config (prompts + extra bank questions)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod config;
mod dashboard;
mod domain;
mod errors;
mod interview;
mod logic;
mod openai;
mod protocol;
mod questions;
mod resume;
mod routes;
mod scoring;
mod seeds;
mod session;
mod state;
mod store;
mod telemetry;
mod ticker;
mod timer;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Settings;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env();
  let state = Arc::new(AppState::from_env(settings.clone()).await?);

  ticker::spawn_ticker(state.clone(), settings.tick_interval_ms);

  let app = build_router(state);
  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "interview_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
