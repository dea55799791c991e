//! HTTP endpoint handlers. Thin wrappers that forward to `logic`.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  Json,
};
use tracing::{info, instrument};

use crate::dashboard::DashboardRow;
use crate::domain::CandidateRecord;
use crate::errors::AppError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, AppError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(logic::health(&state))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_open_session(
  State(state): State<Arc<AppState>>,
  body: Option<Json<OpenSessionIn>>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
  let body = body.map(|Json(b)| b).unwrap_or_default();
  let view = logic::open_session(&state, body.candidate_id.as_deref()).await?;
  info!(target: "interview_backend", session = %view.session_id, "HTTP session opened");
  Ok((StatusCode::CREATED, Json(view)))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<SessionView> {
  Ok(Json(logic::session_status(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_resume_upload(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ResumeUploadIn>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::upload_resume(&state, &id, body).await?))
}

#[instrument(level = "info", skip(state, body), fields(field = %body.field))]
pub async fn http_profile_field(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ProfileFieldIn>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::submit_profile_field(&state, &id, body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_start(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<SessionView> {
  Ok(Json(logic::start_interview(&state, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.response.len(), auto = body.auto_submitted))]
pub async fn http_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> ApiResult<AnswerOut> {
  let (result, session) = logic::submit_answer(&state, &id, body).await?;
  Ok(Json(AnswerOut { result, session }))
}

pub async fn http_draft(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<DraftIn>,
) -> Result<StatusCode, AppError> {
  logic::save_draft(&state, &id, body.text).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_pause(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<PauseOut> {
  let (paused, session) = logic::pause_interview(&state, &id).await?;
  Ok(Json(PauseOut { paused, session }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_resume(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<SessionView> {
  Ok(Json(logic::resume_interview(&state, &id).await?))
}

/// Beacon-style: the page is going away, so the body is empty.
#[instrument(level = "info", skip(state))]
pub async fn http_teardown(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
  logic::teardown(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(choice = ?body.choice))]
pub async fn http_welcome_back(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<WelcomeBackIn>,
) -> ApiResult<SessionView> {
  Ok(Json(logic::welcome_back(&state, &id, body.choice).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_candidates(
  State(state): State<Arc<AppState>>,
  Query(q): Query<CandidateQuery>,
) -> ApiResult<Vec<DashboardRow>> {
  Ok(Json(logic::list_candidates(&state, &q).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_candidate_detail(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<CandidateRecord> {
  Ok(Json(logic::candidate_detail(&state, &id).await?))
}
