//! Domain models: candidate records, the interview they own, questions, answers and timer state.
//!
//! Everything here is plain serde data. Transitions live in `interview`, timer math in `timer`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::non_blank;

/// Number of questions in every interview.
pub const QUESTIONS_PER_INTERVIEW: usize = 6;

/// Questions drawn per difficulty tier.
pub const QUESTIONS_PER_TIER: usize = 2;

/// Maximum expected keywords kept per question.
pub const MAX_EXPECTED_KEYWORDS: usize = 6;

/// Per-question countdown, by difficulty (milliseconds).
pub const QUESTION_TIMINGS: [(Difficulty, i64); 3] = [
  (Difficulty::Easy, 20_000),
  (Difficulty::Medium, 60_000),
  (Difficulty::Hard, 120_000),
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  /// Tier order used for the interview layout.
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn duration_ms(self) -> i64 {
    QUESTION_TIMINGS
      .iter()
      .find(|(d, _)| *d == self)
      .map(|(_, ms)| *ms)
      .unwrap_or(QUESTION_TIMINGS[0].1)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }
}

impl std::fmt::Display for Difficulty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The exact difficulty sequence every interview must follow.
pub fn expected_layout() -> [Difficulty; QUESTIONS_PER_INTERVIEW] {
  [
    Difficulty::Easy,
    Difficulty::Easy,
    Difficulty::Medium,
    Difficulty::Medium,
    Difficulty::Hard,
    Difficulty::Hard,
  ]
}

/// Profile fields the interview collects before it can start.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProfileField {
  Name,
  Email,
  Phone,
}

impl ProfileField {
  /// Asking order.
  pub const ALL: [ProfileField; 3] = [ProfileField::Name, ProfileField::Email, ProfileField::Phone];

  pub fn as_str(self) -> &'static str {
    match self {
      ProfileField::Name => "name",
      ProfileField::Email => "email",
      ProfileField::Phone => "phone",
    }
  }
}

impl std::fmt::Display for ProfileField {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateProfile {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
}

impl CandidateProfile {
  pub fn get(&self, field: ProfileField) -> Option<&str> {
    let v = match field {
      ProfileField::Name => &self.name,
      ProfileField::Email => &self.email,
      ProfileField::Phone => &self.phone,
    };
    v.as_deref().and_then(non_blank)
  }

  pub fn set(&mut self, field: ProfileField, value: String) {
    match field {
      ProfileField::Name => self.name = Some(value),
      ProfileField::Email => self.email = Some(value),
      ProfileField::Phone => self.phone = Some(value),
    }
  }

  /// Fields not yet known, in asking order.
  pub fn missing_fields(&self) -> Vec<ProfileField> {
    ProfileField::ALL
      .into_iter()
      .filter(|f| self.get(*f).is_none())
      .collect()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuestion {
  pub id: String,
  pub prompt: String,
  pub difficulty: Difficulty,
  #[serde(default)]
  pub expected_keywords: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
  pub question_id: String,
  pub response: String,
  pub submitted_at: DateTime<Utc>,
  pub auto_submitted: bool,
  pub score: u8,
  pub reasoning: String,
}

/// Countdown attached to the open question.
///
/// Paused: `remaining_ms_on_pause` is authoritative and `started_at` is ignored.
/// Running: remaining is derived from `started_at`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTimerState {
  pub duration_ms: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
  pub paused: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remaining_ms_on_pause: Option<i64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewStatus {
  Collecting,
  AwaitingStart,
  InProgress,
  Paused,
  Completed,
}

impl InterviewStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      InterviewStatus::Collecting => "collecting",
      InterviewStatus::AwaitingStart => "awaiting-start",
      InterviewStatus::InProgress => "in-progress",
      InterviewStatus::Paused => "paused",
      InterviewStatus::Completed => "completed",
    }
  }
}

impl std::fmt::Display for InterviewStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
  pub status: InterviewStatus,
  #[serde(default)]
  pub questions: Vec<InterviewQuestion>,
  #[serde(default)]
  pub answers: Vec<Answer>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub active_timer: Option<ActiveTimerState>,
  #[serde(default)]
  pub current_question_index: usize,
}

impl Interview {
  pub fn new(status: InterviewStatus) -> Self {
    Self {
      status,
      questions: Vec::new(),
      answers: Vec::new(),
      active_timer: None,
      current_question_index: 0,
    }
  }

  /// The question awaiting an answer; only meaningful while in progress or paused.
  pub fn current_question(&self) -> Option<&InterviewQuestion> {
    match self.status {
      InterviewStatus::InProgress | InterviewStatus::Paused => {
        self.questions.get(self.current_question_index)
      }
      _ => None,
    }
  }

  pub fn has_answer_for(&self, question_id: &str) -> bool {
    self.answers.iter().any(|a| a.question_id == question_id)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
  pub overall_score: u8,
  pub strengths: Vec<String>,
  pub areas_to_improve: Vec<String>,
  pub final_remark: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
  Assistant,
  Candidate,
  System,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
  Plain,
  Question,
  Summary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
  pub id: String,
  pub sender: ChatSender,
  pub kind: MessageKind,
  pub content: String,
  pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
  pub fn new(sender: ChatSender, kind: MessageKind, content: impl Into<String>, at: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      sender,
      kind,
      content: content.into(),
      timestamp: at,
    }
  }
}

/// One interviewee end to end. Owns its interview, chat log and summary.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
  pub id: String,
  pub profile: CandidateProfile,
  #[serde(default)]
  pub resume_text: String,
  pub interview: Interview,
  #[serde(default)]
  pub chat: Vec<ChatMessage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub summary: Option<CandidateSummary>,
  pub updated_at: DateTime<Utc>,
}

impl CandidateRecord {
  pub fn new(profile: CandidateProfile, resume_text: String, status: InterviewStatus, at: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      profile,
      resume_text,
      interview: Interview::new(status),
      chat: Vec::new(),
      summary: None,
      updated_at: at,
    }
  }

  /// Append-only; the chat log is never edited.
  pub fn push_chat(&mut self, sender: ChatSender, kind: MessageKind, content: impl Into<String>, at: DateTime<Utc>) {
    self.chat.push(ChatMessage::new(sender, kind, content, at));
  }

  pub fn touch(&mut self, at: DateTime<Utc>) {
    self.updated_at = at;
  }

  pub fn progress(&self) -> Progress {
    Progress {
      answered: self.interview.answers.len(),
      total: self.interview.questions.len(),
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
  pub answered: usize,
  pub total: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn durations_follow_the_timing_table() {
    assert_eq!(Difficulty::Easy.duration_ms(), 20_000);
    assert_eq!(Difficulty::Medium.duration_ms(), 60_000);
    assert_eq!(Difficulty::Hard.duration_ms(), 120_000);
  }

  #[test]
  fn missing_fields_ignore_blank_values() {
    let profile = CandidateProfile {
      name: Some("Ada Lovelace".into()),
      email: Some("   ".into()),
      phone: None,
    };
    assert_eq!(profile.missing_fields(), vec![ProfileField::Email, ProfileField::Phone]);
  }

  #[test]
  fn status_serializes_kebab_case() {
    let s = serde_json::to_string(&InterviewStatus::AwaitingStart).unwrap();
    assert_eq!(s, "\"awaiting-start\"");
    let s = serde_json::to_string(&InterviewStatus::InProgress).unwrap();
    assert_eq!(s, "\"in-progress\"");
  }

  #[test]
  fn current_question_only_while_open() {
    let mut iv = Interview::new(InterviewStatus::AwaitingStart);
    iv.questions.push(InterviewQuestion {
      id: "q1".into(),
      prompt: "p".into(),
      difficulty: Difficulty::Easy,
      expected_keywords: vec![],
    });
    assert!(iv.current_question().is_none());
    iv.status = InterviewStatus::InProgress;
    assert_eq!(iv.current_question().map(|q| q.id.as_str()), Some("q1"));
  }
}
