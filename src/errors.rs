use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::InterviewStatus;

/// AI provider failures. Always recovered locally (fallback bank / heuristic scorer).
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("provider disabled (no OPENAI_API_KEY)")]
  Disabled,

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("API error (status {status}): {message}")]
  Api { status: u16, message: String },

  #[error("provider returned empty content")]
  EmptyContent,

  #[error("JSON parse error: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("provider returned {0} questions, at least 6 required")]
  TooFewQuestions(usize),

  #[error("questions are not two easy, two medium and two hard")]
  TierLayout,
}

#[derive(Debug, Error)]
pub enum ScoringError {
  #[error("scoring provider failed: {0}")]
  Provider(#[from] ProviderError),

  #[error("invalid scoring output: {0}")]
  Invalid(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
  #[error("store I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store encoding error: {0}")]
  Serde(#[from] serde_json::Error),
}

/// Errors surfaced by interview transitions.
#[derive(Debug, Error)]
pub enum InterviewError {
  #[error("Validation error: {0}")]
  Validation(String),

  #[error("cannot {action} while interview is {status}")]
  Transition { action: &'static str, status: InterviewStatus },

  #[error("no active candidate in this session")]
  NoActiveCandidate,

  #[error("candidate not found: {0}")]
  CandidateNotFound(String),

  #[error("could not prepare interview questions: {0}")]
  QuestionsUnavailable(String),

  /// The in-memory state already holds the change; the next successful write persists it.
  #[error("could not save candidate: {0}")]
  Persistence(#[from] PersistenceError),
}

/// HTTP-facing error. Implements `IntoResponse` so handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Interview(#[from] InterviewError),

  #[error("session not found: {0}")]
  SessionNotFound(String),

  #[error("Bad request: {0}")]
  BadRequest(String),

  #[error("Please upload a PDF or DOCX resume.")]
  UnsupportedResume,
}

impl AppError {
  pub fn parts(&self) -> (StatusCode, &'static str, String, bool) {
    match self {
      AppError::Interview(e) => match e {
        InterviewError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), false),
        InterviewError::Transition { .. } => {
          tracing::warn!(target: "interview", error = %e, "Rejected transition");
          (StatusCode::CONFLICT, "TRANSITION_ERROR", e.to_string(), false)
        }
        InterviewError::NoActiveCandidate => (StatusCode::CONFLICT, "NO_ACTIVE_CANDIDATE", e.to_string(), false),
        InterviewError::CandidateNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string(), false),
        InterviewError::QuestionsUnavailable(_) => {
          tracing::error!(target: "interview", error = %e, "Question source failed");
          (StatusCode::SERVICE_UNAVAILABLE, "QUESTIONS_UNAVAILABLE", e.to_string(), true)
        }
        InterviewError::Persistence(inner) => {
          tracing::error!(target: "interview", error = %inner, "Persistence error");
          (
            StatusCode::SERVICE_UNAVAILABLE,
            "PERSISTENCE_ERROR",
            "Could not save your progress. Please retry.".to_string(),
            true,
          )
        }
      },
      AppError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", self.to_string(), false),
      AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), false),
      AppError::UnsupportedResume => (StatusCode::BAD_REQUEST, "UNSUPPORTED_RESUME", self.to_string(), false),
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let (status, code, message, retryable) = self.parts();
    let body = Json(json!({
      "error": {
        "code": code,
        "message": message,
        "retryable": retryable,
      }
    }));
    (status, body).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_codes_follow_error_kind() {
    let cases = [
      (AppError::from(InterviewError::Validation("empty".into())), StatusCode::BAD_REQUEST),
      (
        AppError::from(InterviewError::Transition { action: "submit an answer", status: InterviewStatus::Paused }),
        StatusCode::CONFLICT,
      ),
      (AppError::from(InterviewError::CandidateNotFound("x".into())), StatusCode::NOT_FOUND),
      (
        AppError::from(InterviewError::Persistence(PersistenceError::Io(std::io::Error::other("disk")))),
        StatusCode::SERVICE_UNAVAILABLE,
      ),
      (AppError::UnsupportedResume, StatusCode::BAD_REQUEST),
    ];
    for (err, status) in cases {
      assert_eq!(err.into_response().status(), status);
    }
  }

  #[test]
  fn persistence_is_retryable_bad_request_is_not() {
    let (_, _, _, retry) =
      AppError::from(InterviewError::Persistence(PersistenceError::Io(std::io::Error::other("disk")))).parts();
    assert!(retry);
    let (_, _, _, retry) = AppError::BadRequest("x".into()).parts();
    assert!(!retry);
  }

  #[test]
  fn transition_message_names_action_and_status() {
    let e = InterviewError::Transition { action: "submit an answer", status: InterviewStatus::Paused };
    assert_eq!(e.to_string(), "cannot submit an answer while interview is paused");
  }
}
