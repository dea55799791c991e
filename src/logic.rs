//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! Every session action locks the session for its whole duration and answers with a fresh
//! `SessionView`, so both transports see the same state machine through the same path.

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument};

use crate::dashboard::{dashboard_rows, DashboardRow};
use crate::domain::CandidateRecord;
use crate::errors::{AppError, InterviewError};
use crate::interview::{SubmitAnswer, SubmitOutcome};
use crate::protocol::{AnswerIn, CandidateQuery, HealthOut, ProfileFieldIn, ResumeUploadIn, SessionView};
use crate::resume::{guess_profile, is_supported_resume};
use crate::session::{SessionContext, WelcomeBackChoice};
use crate::state::AppState;

pub fn health(state: &AppState) -> HealthOut {
  let engine = state.engine();
  HealthOut {
    ok: true,
    question_provider: engine.question_source().provider_name(),
    scorer: engine.scoring().primary_name(),
  }
}

/// Lock a live session and mark it active. A session evicted while we waited is gone.
async fn session(state: &AppState, session_id: &str) -> Result<OwnedMutexGuard<SessionContext>, AppError> {
  let not_found = || AppError::SessionNotFound(session_id.to_string());
  let handle = state.sessions.get(session_id).await.ok_or_else(not_found)?;
  let mut ctx = handle.lock_owned().await;
  if state.sessions.get(session_id).await.is_none() {
    return Err(not_found());
  }
  ctx.touch(state.engine().clock().now());
  Ok(ctx)
}

pub fn view(state: &AppState, ctx: &SessionContext) -> SessionView {
  SessionView::of(ctx, state.engine().clock().now())
}

#[instrument(level = "info", skip(state))]
pub async fn open_session(state: &AppState, candidate_id: Option<&str>) -> Result<SessionView, AppError> {
  if candidate_id.is_some_and(|id| id.trim().is_empty()) {
    return Err(AppError::BadRequest("candidateId must not be blank".into()));
  }
  let (_, handle) = state.sessions.open(candidate_id).await?;
  let ctx = handle.lock().await;
  Ok(view(state, &ctx))
}

pub async fn session_status(state: &AppState, session_id: &str) -> Result<SessionView, AppError> {
  let ctx = session(state, session_id).await?;
  Ok(view(state, &ctx))
}

#[instrument(level = "info", skip(state, body), fields(file_name = %body.file_name, text_len = body.resume_text.len()))]
pub async fn upload_resume(state: &AppState, session_id: &str, body: ResumeUploadIn) -> Result<SessionView, AppError> {
  if !is_supported_resume(&body.file_name) {
    info!(target: "interview", file_name = %body.file_name, "Rejected resume file type");
    return Err(AppError::UnsupportedResume);
  }
  let profile = guess_profile(&body.resume_text, body.profile_guess.as_ref());
  debug!(target: "interview", missing = profile.missing_fields().len(), "Profile guessed from resume");

  let mut ctx = session(state, session_id).await?;
  state.engine().ingest_resume(&mut ctx, &body.resume_text, profile).await?;
  state.sessions.claim(&ctx).await;
  Ok(view(state, &ctx))
}

pub async fn submit_profile_field(state: &AppState, session_id: &str, body: ProfileFieldIn) -> Result<SessionView, AppError> {
  let mut ctx = session(state, session_id).await?;
  state.engine().submit_profile_field(&mut ctx, body.field, &body.value).await?;
  Ok(view(state, &ctx))
}

pub async fn start_interview(state: &AppState, session_id: &str) -> Result<SessionView, AppError> {
  let mut ctx = session(state, session_id).await?;
  state.engine().start_interview(&mut ctx).await?;
  Ok(view(state, &ctx))
}

pub async fn submit_answer(
  state: &AppState,
  session_id: &str,
  body: AnswerIn,
) -> Result<(SubmitOutcome, SessionView), AppError> {
  // Without a target a late submit would land on whatever question is current by then.
  let Some(question_id) = body.question_id.filter(|id| !id.trim().is_empty()) else {
    return Err(AppError::BadRequest("questionId is required".into()));
  };
  let mut ctx = session(state, session_id).await?;
  let input = SubmitAnswer {
    response: body.response,
    auto_submitted: body.auto_submitted,
    question_id: Some(question_id),
  };
  let outcome = state.engine().submit_answer(&mut ctx, input).await?;
  Ok((outcome, view(state, &ctx)))
}

/// Remember the candidate's unsent text for a possible auto-submit.
pub async fn save_draft(state: &AppState, session_id: &str, text: String) -> Result<(), AppError> {
  let mut ctx = session(state, session_id).await?;
  if ctx.active.is_none() {
    return Err(InterviewError::NoActiveCandidate.into());
  }
  ctx.draft = text;
  Ok(())
}

pub async fn pause_interview(state: &AppState, session_id: &str) -> Result<(bool, SessionView), AppError> {
  let mut ctx = session(state, session_id).await?;
  let paused = state.engine().pause_interview(&mut ctx).await?;
  Ok((paused, view(state, &ctx)))
}

pub async fn resume_interview(state: &AppState, session_id: &str) -> Result<SessionView, AppError> {
  let mut ctx = session(state, session_id).await?;
  state.engine().resume_interview(&mut ctx).await?;
  Ok(view(state, &ctx))
}

/// Pause and drop the session. A session that is already gone makes this a no-op.
pub async fn teardown(state: &AppState, session_id: &str) -> Result<bool, AppError> {
  let mut ctx = match session(state, session_id).await {
    Ok(ctx) => ctx,
    Err(AppError::SessionNotFound(_)) => return Ok(false),
    Err(e) => return Err(e),
  };
  Ok(state.sessions.teardown(&mut ctx).await?)
}

pub async fn socket_opened(state: &AppState, session_id: &str) -> Result<(), AppError> {
  let mut ctx = session(state, session_id).await?;
  ctx.sockets += 1;
  Ok(())
}

/// The last socket closing counts as environment teardown.
pub async fn socket_closed(state: &AppState, session_id: &str) -> Result<bool, AppError> {
  let remaining = match session(state, session_id).await {
    Ok(mut ctx) => {
      ctx.sockets = ctx.sockets.saturating_sub(1);
      ctx.sockets
    }
    Err(AppError::SessionNotFound(_)) => return Ok(false),
    Err(e) => return Err(e),
  };
  if remaining > 0 {
    return Ok(false);
  }
  teardown(state, session_id).await
}

pub async fn welcome_back(state: &AppState, session_id: &str, choice: WelcomeBackChoice) -> Result<SessionView, AppError> {
  let mut ctx = session(state, session_id).await?;
  state.sessions.resolve_welcome_back(&mut ctx, choice).await?;
  Ok(view(state, &ctx))
}

pub async fn list_candidates(state: &AppState, query: &CandidateQuery) -> Result<Vec<DashboardRow>, AppError> {
  let records = state.store().list().await.map_err(InterviewError::from)?;
  Ok(dashboard_rows(&records, query.search.as_deref(), query.sort.unwrap_or_default()))
}

pub async fn candidate_detail(state: &AppState, candidate_id: &str) -> Result<CandidateRecord, AppError> {
  state
    .store()
    .get(candidate_id)
    .await
    .map_err(InterviewError::from)?
    .ok_or_else(|| InterviewError::CandidateNotFound(candidate_id.to_string()).into())
}
