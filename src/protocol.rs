//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! camelCase on the wire. Candidate-facing views never carry expected keywords.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dashboard::SortBy;
use crate::domain::{
  CandidateProfile, CandidateRecord, CandidateSummary, ChatMessage, Difficulty, InterviewStatus, ProfileField, Progress,
};
use crate::interview::SubmitOutcome;
use crate::session::{SessionContext, WelcomeBackChoice};
use crate::timer::TimerSnapshot;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  Status,
  SubmitAnswer {
    response: String,
    #[serde(default, rename = "autoSubmitted")]
    auto_submitted: bool,
    #[serde(default, rename = "questionId")]
    question_id: Option<String>,
  },
  Draft {
    text: String,
  },
  Pause,
  Resume,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Session {
    session: SessionView,
  },
  AnswerResult {
    result: SubmitOutcome,
    session: SessionView,
  },
  Error {
    code: &'static str,
    message: String,
    retryable: bool,
  },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
  pub ok: bool,
  pub question_provider: Option<&'static str>,
  pub scorer: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionIn {
  #[serde(default)]
  pub candidate_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeUploadIn {
  pub file_name: String,
  pub resume_text: String,
  #[serde(default)]
  pub profile_guess: Option<CandidateProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileFieldIn {
  pub field: ProfileField,
  pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
  pub response: String,
  #[serde(default)]
  pub auto_submitted: bool,
  #[serde(default)]
  pub question_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DraftIn {
  pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct WelcomeBackIn {
  pub choice: WelcomeBackChoice,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateQuery {
  #[serde(default)]
  pub search: Option<String>,
  #[serde(default)]
  pub sort: Option<SortBy>,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
  pub session: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
  pub result: SubmitOutcome,
  pub session: SessionView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseOut {
  pub paused: bool,
  pub session: SessionView,
}

/// The open question as the candidate sees it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
  pub id: String,
  pub number: usize,
  pub total: usize,
  pub prompt: String,
  pub difficulty: Difficulty,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
  pub id: String,
  pub profile: CandidateProfile,
  pub status: InterviewStatus,
  pub progress: Progress,
  pub outstanding_field: Option<ProfileField>,
  pub chat: Vec<ChatMessage>,
  pub summary: Option<CandidateSummary>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub session_id: String,
  pub welcome_back: bool,
  pub candidate: Option<CandidateView>,
  pub current_question: Option<QuestionView>,
  pub timer: Option<TimerSnapshot>,
}

impl SessionView {
  pub fn of(ctx: &SessionContext, now: DateTime<Utc>) -> Self {
    let record = ctx.active.as_ref();
    Self {
      session_id: ctx.id.clone(),
      welcome_back: ctx.welcome_back,
      candidate: record.map(candidate_view),
      current_question: record.and_then(question_view),
      timer: record
        .and_then(|r| r.interview.active_timer.as_ref())
        .map(|t| TimerSnapshot::of(t, now)),
    }
  }
}

fn candidate_view(record: &CandidateRecord) -> CandidateView {
  let outstanding_field = match record.interview.status {
    InterviewStatus::Collecting => record.profile.missing_fields().first().copied(),
    _ => None,
  };
  CandidateView {
    id: record.id.clone(),
    profile: record.profile.clone(),
    status: record.interview.status,
    progress: record.progress(),
    outstanding_field,
    chat: record.chat.clone(),
    summary: record.summary.clone(),
    updated_at: record.updated_at,
  }
}

fn question_view(record: &CandidateRecord) -> Option<QuestionView> {
  let interview = &record.interview;
  interview.current_question().map(|q| QuestionView {
    id: q.id.clone(),
    number: interview.current_question_index + 1,
    total: interview.questions.len(),
    prompt: q.prompt.clone(),
    difficulty: q.difficulty,
  })
}
