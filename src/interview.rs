//! Interview lifecycle state machine.
//!
//! ```text
//! collecting ──► awaiting-start ──► in-progress ⇄ paused
//!                                        │
//!                                        └──► completed (terminal)
//! ```
//!
//! Every transition takes the session's `SessionContext` by `&mut`. The caller holds the
//! session lock for the whole call, so status checks, answer recording and question
//! advancement never interleave with another transition on the same session.
//!
//! After a mutation the active record is written to the store. If that write fails the
//! in-memory record stays authoritative (`dirty`), the caller gets a retryable
//! `InterviewError::Persistence`, and the next transition or tick writes it again.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{
  expected_layout, Answer, CandidateProfile, CandidateRecord, ChatSender, Difficulty, InterviewStatus,
  MessageKind, ProfileField, QUESTIONS_PER_INTERVIEW,
};
use crate::errors::InterviewError;
use crate::questions::QuestionSource;
use crate::scoring::Scoring;
use crate::session::SessionContext;
use crate::store::SharedStore;
use crate::timer::{pause_timer, resume_timer, start_timer, SharedClock};

/// Request to record an answer for the open question.
#[derive(Clone, Debug, Default)]
pub struct SubmitAnswer {
  pub response: String,
  pub auto_submitted: bool,
  /// Question the client was looking at. A submit aimed at any other question is ignored.
  pub question_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
  #[serde(rename_all = "camelCase")]
  Recorded { question_id: String, score: u8, completed: bool },
  Ignored { reason: &'static str },
}

pub struct InterviewEngine {
  store: SharedStore,
  questions: QuestionSource,
  scoring: Scoring,
  clock: SharedClock,
}

fn question_message(index: usize, difficulty: Difficulty, prompt: &str) -> String {
  format!("Question {}/{} ({}): {}", index + 1, QUESTIONS_PER_INTERVIEW, difficulty, prompt)
}

fn field_prompt(field: ProfileField) -> String {
  format!("Before we begin, please provide your {}.", field)
}

fn ready_message(profile: &CandidateProfile) -> String {
  match profile.get(ProfileField::Name) {
    Some(name) => format!("Thanks, {}! Your profile is complete. Start the interview whenever you are ready.", name),
    None => "Thanks! Your profile is complete. Start the interview whenever you are ready.".to_string(),
  }
}

impl InterviewEngine {
  pub fn new(store: SharedStore, questions: QuestionSource, scoring: Scoring, clock: SharedClock) -> Self {
    Self { store, questions, scoring, clock }
  }

  pub fn clock(&self) -> &SharedClock {
    &self.clock
  }

  pub fn question_source(&self) -> &QuestionSource {
    &self.questions
  }

  pub fn scoring(&self) -> &Scoring {
    &self.scoring
  }

  /// Write the active record. On failure it stays dirty for the next attempt.
  pub(crate) async fn persist(&self, ctx: &mut SessionContext) -> Result<(), InterviewError> {
    let Some(record) = ctx.active.as_ref() else {
      ctx.dirty = false;
      return Ok(());
    };
    match self.store.put(record.clone()).await {
      Ok(()) => {
        ctx.dirty = false;
        Ok(())
      }
      Err(e) => {
        ctx.dirty = true;
        warn!(target: "interview", candidate_id = %record.id, error = %e, "Candidate write failed; keeping in-memory state");
        Err(e.into())
      }
    }
  }

  async fn flush_if_dirty(&self, ctx: &mut SessionContext) -> Result<(), InterviewError> {
    if ctx.dirty {
      self.persist(ctx).await
    } else {
      Ok(())
    }
  }

  /// New candidate from resume text. Allowed when nothing is active or the active interview is completed.
  #[instrument(level = "info", skip_all, fields(session = %ctx.id, resume_len = resume_text.len()))]
  pub async fn ingest_resume(
    &self,
    ctx: &mut SessionContext,
    resume_text: &str,
    profile_guess: CandidateProfile,
  ) -> Result<CandidateRecord, InterviewError> {
    if let Some(active) = &ctx.active {
      let status = active.interview.status;
      if status != InterviewStatus::Completed {
        return Err(InterviewError::Transition { action: "upload a resume", status });
      }
    }
    let resume_text = resume_text.trim();
    if resume_text.is_empty() {
      return Err(InterviewError::Validation("Could not read any text from the resume.".into()));
    }

    let now = self.clock.now();
    let mut profile = CandidateProfile::default();
    for field in ProfileField::ALL {
      if let Some(v) = profile_guess.get(field) {
        profile.set(field, v.to_string());
      }
    }
    let missing = profile.missing_fields();
    let status = if missing.is_empty() { InterviewStatus::AwaitingStart } else { InterviewStatus::Collecting };

    let mut record = CandidateRecord::new(profile, resume_text.to_string(), status, now);
    record.push_chat(
      ChatSender::System,
      MessageKind::Plain,
      "Resume received. Your interview has 6 timed questions: 2 easy, 2 medium and 2 hard.",
      now,
    );
    let opening = match missing.first() {
      Some(field) => field_prompt(*field),
      None => ready_message(&record.profile),
    };
    record.push_chat(ChatSender::Assistant, MessageKind::Plain, opening, now);

    info!(target: "interview", candidate_id = %record.id, %status, missing = missing.len(), "Resume ingested");
    ctx.bind(record);
    self.persist(ctx).await?;
    ctx.active.clone().ok_or(InterviewError::NoActiveCandidate)
  }

  /// Record one missing profile field. Valid only while collecting.
  #[instrument(level = "info", skip(self, ctx, value), fields(session = %ctx.id))]
  pub async fn submit_profile_field(
    &self,
    ctx: &mut SessionContext,
    field: ProfileField,
    value: &str,
  ) -> Result<CandidateRecord, InterviewError> {
    let now = self.clock.now();
    let record = ctx.active.as_mut().ok_or(InterviewError::NoActiveCandidate)?;
    let status = record.interview.status;
    if status != InterviewStatus::Collecting {
      return Err(InterviewError::Transition { action: "submit a profile field", status });
    }
    let value = value.trim();
    if value.is_empty() {
      return Err(InterviewError::Validation(format!("Your {} cannot be empty.", field)));
    }
    if record.profile.get(field).is_some() {
      return Err(InterviewError::Validation(format!("Your {} is already on file.", field)));
    }

    record.profile.set(field, value.to_string());
    record.push_chat(ChatSender::Candidate, MessageKind::Plain, value, now);

    let missing = record.profile.missing_fields();
    match missing.first() {
      Some(next) => record.push_chat(ChatSender::Assistant, MessageKind::Plain, field_prompt(*next), now),
      None => {
        record.interview.status = InterviewStatus::AwaitingStart;
        let msg = ready_message(&record.profile);
        record.push_chat(ChatSender::Assistant, MessageKind::Plain, msg, now);
      }
    }
    record.touch(now);
    info!(target: "interview", candidate_id = %record.id, %field, remaining = missing.len(), status = %record.interview.status, "Profile field recorded");

    self.persist(ctx).await?;
    ctx.active.clone().ok_or(InterviewError::NoActiveCandidate)
  }

  /// Generate questions and open the first one. Valid only in awaiting-start.
  #[instrument(level = "info", skip_all, fields(session = %ctx.id))]
  pub async fn start_interview(&self, ctx: &mut SessionContext) -> Result<CandidateRecord, InterviewError> {
    let (profile, resume_text) = {
      let record = ctx.active.as_ref().ok_or(InterviewError::NoActiveCandidate)?;
      let status = record.interview.status;
      if status != InterviewStatus::AwaitingStart {
        return Err(InterviewError::Transition { action: "start the interview", status });
      }
      (record.profile.clone(), record.resume_text.clone())
    };

    let generated = self.questions.generate_or_fallback(&profile, &resume_text).await;
    let layout: Vec<Difficulty> = generated.questions.iter().map(|q| q.difficulty).collect();
    if layout != expected_layout() {
      return Err(InterviewError::QuestionsUnavailable(format!(
        "expected 2 easy, 2 medium, 2 hard; got {:?}",
        layout
      )));
    }

    let now = self.clock.now();
    let record = ctx.active.as_mut().ok_or(InterviewError::NoActiveCandidate)?;
    // Re-checked: the generation await may have been long.
    let status = record.interview.status;
    if status != InterviewStatus::AwaitingStart {
      return Err(InterviewError::Transition { action: "start the interview", status });
    }

    let first = generated.questions[0].clone();
    record.interview.questions = generated.questions;
    record.interview.answers.clear();
    record.interview.current_question_index = 0;
    record.interview.active_timer = Some(start_timer(first.difficulty.duration_ms(), now));
    record.interview.status = InterviewStatus::InProgress;
    record.push_chat(
      ChatSender::Assistant,
      MessageKind::Question,
      question_message(0, first.difficulty, &first.prompt),
      now,
    );
    record.touch(now);
    info!(target: "interview", candidate_id = %record.id, origin = generated.origin.label(), "Interview started");

    ctx.latch.reset();
    ctx.draft.clear();
    self.persist(ctx).await?;
    ctx.active.clone().ok_or(InterviewError::NoActiveCandidate)
  }

  /// Score and record the answer for the open question, then advance or complete.
  ///
  /// At most one answer per question: a repeat (manual submit racing the expiry auto-submit)
  /// is ignored, whichever arrives second.
  #[instrument(level = "info", skip(self, ctx, input), fields(session = %ctx.id, auto = input.auto_submitted, answer_len = input.response.len()))]
  pub async fn submit_answer(
    &self,
    ctx: &mut SessionContext,
    input: SubmitAnswer,
  ) -> Result<SubmitOutcome, InterviewError> {
    let (question, candidate_name) = {
      let record = ctx.active.as_ref().ok_or(InterviewError::NoActiveCandidate)?;
      let interview = &record.interview;

      if let Some(target) = input.question_id.as_deref() {
        if interview.has_answer_for(target) {
          info!(target: "interview", question_id = target, "Duplicate submit ignored");
          self.flush_if_dirty(ctx).await?;
          return Ok(SubmitOutcome::Ignored { reason: "already_answered" });
        }
      }

      let status = interview.status;
      if status != InterviewStatus::InProgress {
        return Err(InterviewError::Transition { action: "submit an answer", status });
      }
      let Some(question) = interview.questions.get(interview.current_question_index).cloned() else {
        return Err(InterviewError::Transition { action: "submit an answer", status });
      };
      if let Some(target) = input.question_id.as_deref() {
        if target != question.id {
          info!(target: "interview", question_id = target, current = %question.id, "Submit for a non-current question ignored");
          return Ok(SubmitOutcome::Ignored { reason: "not_current_question" });
        }
      }
      if interview.has_answer_for(&question.id) {
        return Ok(SubmitOutcome::Ignored { reason: "already_answered" });
      }
      (question, record.profile.get(ProfileField::Name).map(str::to_string))
    };

    let response = input.response.trim().to_string();
    if response.is_empty() && !input.auto_submitted {
      return Err(InterviewError::Validation("Please provide an answer before submitting.".into()));
    }

    let scored = self.scoring.score(&question, &response).await;

    let now = self.clock.now();
    let record = ctx.active.as_mut().ok_or(InterviewError::NoActiveCandidate)?;
    let index = record.interview.current_question_index;

    if response.is_empty() {
      record.push_chat(
        ChatSender::System,
        MessageKind::Plain,
        format!("Time ran out for question {}. No answer was submitted.", index + 1),
        now,
      );
    } else {
      record.push_chat(ChatSender::Candidate, MessageKind::Plain, response.clone(), now);
      if input.auto_submitted {
        record.push_chat(
          ChatSender::System,
          MessageKind::Plain,
          format!("Time ran out for question {}. Your draft was submitted.", index + 1),
          now,
        );
      }
    }
    record.interview.answers.push(Answer {
      question_id: question.id.clone(),
      response,
      submitted_at: now,
      auto_submitted: input.auto_submitted,
      score: scored.score,
      reasoning: scored.reasoning,
    });

    let next_index = index + 1;
    record.interview.current_question_index = next_index;
    let completed = match record.interview.questions.get(next_index).cloned() {
      Some(next) => {
        record.interview.active_timer = Some(start_timer(next.difficulty.duration_ms(), now));
        record.push_chat(
          ChatSender::Assistant,
          MessageKind::Question,
          question_message(next_index, next.difficulty, &next.prompt),
          now,
        );
        false
      }
      None => {
        record.interview.active_timer = None;
        true
      }
    };

    if completed {
      let summary = self
        .scoring
        .summarize(candidate_name.as_deref(), &record.interview.questions, &record.interview.answers)
        .await;
      let now = self.clock.now();
      record.push_chat(
        ChatSender::Assistant,
        MessageKind::Summary,
        format!("Interview complete! Final score: {}/100. {}", summary.overall_score, summary.final_remark),
        now,
      );
      record.summary = Some(summary);
      record.interview.status = InterviewStatus::Completed;
      record.touch(now);
      info!(target: "interview", candidate_id = %record.id, "Interview completed");
    } else {
      record.touch(now);
    }
    info!(target: "interview", candidate_id = %record.id, question_id = %question.id, score = scored.score, auto = input.auto_submitted, "Answer recorded");

    ctx.draft.clear();
    self.persist(ctx).await?;
    Ok(SubmitOutcome::Recorded { question_id: question.id, score: scored.score, completed })
  }

  /// Freeze the timer. Benign no-op (returns false) unless the interview is in progress.
  #[instrument(level = "info", skip_all, fields(session = %ctx.id))]
  pub async fn pause_interview(&self, ctx: &mut SessionContext) -> Result<bool, InterviewError> {
    let now = self.clock.now();
    let paused = match ctx.active.as_mut() {
      Some(record) if record.interview.status == InterviewStatus::InProgress => {
        let duration = record
          .interview
          .current_question()
          .map(|q| q.difficulty.duration_ms())
          .unwrap_or(Difficulty::Easy.duration_ms());
        let timer = record.interview.active_timer.get_or_insert_with(|| start_timer(duration, now));
        pause_timer(timer, now);
        record.interview.status = InterviewStatus::Paused;
        record.push_chat(ChatSender::System, MessageKind::Plain, "Interview paused.", now);
        record.touch(now);
        info!(target: "interview", candidate_id = %record.id, remaining_ms = ?timer_remaining(record), "Interview paused");
        true
      }
      _ => false,
    };
    if paused {
      self.persist(ctx).await?;
    } else {
      self.flush_if_dirty(ctx).await?;
    }
    Ok(paused)
  }

  /// Restart the frozen timer. Valid only while paused.
  #[instrument(level = "info", skip_all, fields(session = %ctx.id))]
  pub async fn resume_interview(&self, ctx: &mut SessionContext) -> Result<CandidateRecord, InterviewError> {
    let now = self.clock.now();
    let record = ctx.active.as_mut().ok_or(InterviewError::NoActiveCandidate)?;
    let status = record.interview.status;
    if status != InterviewStatus::Paused {
      return Err(InterviewError::Transition { action: "resume the interview", status });
    }
    let duration = record
      .interview
      .current_question()
      .map(|q| q.difficulty.duration_ms())
      .unwrap_or(Difficulty::Easy.duration_ms());
    let timer = record.interview.active_timer.get_or_insert_with(|| {
      let mut t = start_timer(duration, now);
      pause_timer(&mut t, now);
      t
    });
    resume_timer(timer, now);
    record.interview.status = InterviewStatus::InProgress;
    record.push_chat(ChatSender::System, MessageKind::Plain, "Interview resumed.", now);
    record.touch(now);
    info!(target: "interview", candidate_id = %record.id, "Interview resumed");

    ctx.welcome_back = false;
    self.persist(ctx).await?;
    ctx.active.clone().ok_or(InterviewError::NoActiveCandidate)
  }

  /// One timer tick: on the first observed expiry of the open question, auto-submit the draft.
  pub async fn tick(&self, ctx: &mut SessionContext) -> Result<Option<SubmitOutcome>, InterviewError> {
    let now = self.clock.now();
    let expired_question = match ctx.active.as_ref() {
      Some(record) if record.interview.status == InterviewStatus::InProgress => {
        match (record.interview.current_question(), record.interview.active_timer.as_ref()) {
          (Some(q), Some(timer)) if ctx.latch.observe(&q.id, timer, now) => Some(q.id.clone()),
          _ => None,
        }
      }
      _ => None,
    };

    let Some(question_id) = expired_question else {
      self.flush_if_dirty(ctx).await?;
      return Ok(None);
    };

    info!(target: "interview", session = %ctx.id, %question_id, "Timer expired; auto-submitting");
    let input = SubmitAnswer {
      response: std::mem::take(&mut ctx.draft),
      auto_submitted: true,
      question_id: Some(question_id),
    };
    self.submit_answer(ctx, input).await.map(Some)
  }
}

fn timer_remaining(record: &CandidateRecord) -> Option<i64> {
  record.interview.active_timer.as_ref().and_then(|t| t.remaining_ms_on_pause)
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::questions::tests::{FailingProvider, PayloadProvider, valid_payload};
  use crate::scoring::tests::BrokenScorer;
  use crate::seeds::QuestionBank;
  use crate::store::tests::FlakyStore;
  use crate::store::{CandidateStore, MemoryStore};
  use crate::timer::{remaining_ms, Clock, ManualClock};
  use chrono::{TimeZone, Utc};
  use std::sync::atomic::Ordering;
  use std::sync::Arc;

  pub fn clock() -> Arc<ManualClock> {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap())
  }

  pub fn engine_with(store: SharedStore, clock: Arc<ManualClock>) -> InterviewEngine {
    let source = QuestionSource::new(Some(Arc::new(FailingProvider::new())), QuestionBank::default(), 2).with_seed(42);
    InterviewEngine::new(store, source, Scoring::default(), clock)
  }

  pub fn full_profile() -> CandidateProfile {
    CandidateProfile {
      name: Some("Ada Lovelace".into()),
      email: Some("ada@example.com".into()),
      phone: Some("+44 20 7946 0000".into()),
    }
  }

  async fn started(engine: &InterviewEngine) -> SessionContext {
    let mut ctx = SessionContext::new("s1");
    engine.ingest_resume(&mut ctx, "React and Node engineer", full_profile()).await.unwrap();
    engine.start_interview(&mut ctx).await.unwrap();
    ctx
  }

  fn status(ctx: &SessionContext) -> InterviewStatus {
    ctx.active.as_ref().unwrap().interview.status
  }

  fn current_id(ctx: &SessionContext) -> String {
    ctx.active.as_ref().unwrap().interview.current_question().unwrap().id.clone()
  }

  fn manual(text: &str) -> SubmitAnswer {
    SubmitAnswer { response: text.into(), auto_submitted: false, question_id: None }
  }

  #[tokio::test]
  async fn resume_missing_email_collects_then_awaits_start() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone(), clock());
    let mut ctx = SessionContext::new("s1");

    let guess = CandidateProfile { email: None, ..full_profile() };
    let rec = engine.ingest_resume(&mut ctx, "resume text", guess).await.unwrap();
    assert_eq!(rec.interview.status, InterviewStatus::Collecting);
    assert_eq!(rec.profile.missing_fields(), vec![ProfileField::Email]);
    assert_eq!(rec.chat.len(), 2);
    assert!(rec.chat[1].content.contains("email"));

    let rec = engine.submit_profile_field(&mut ctx, ProfileField::Email, "a@b.com").await.unwrap();
    assert_eq!(rec.interview.status, InterviewStatus::AwaitingStart);
    assert_eq!(rec.profile.email.as_deref(), Some("a@b.com"));
    assert_eq!(rec.chat[2].sender, ChatSender::Candidate);
    assert_eq!(rec.chat[2].content, "a@b.com");

    let stored = store.get(&rec.id).await.unwrap().unwrap();
    assert_eq!(stored, rec);
  }

  #[tokio::test]
  async fn complete_profile_goes_straight_to_awaiting_start() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = SessionContext::new("s1");
    let rec = engine.ingest_resume(&mut ctx, "resume", full_profile()).await.unwrap();
    assert_eq!(rec.interview.status, InterviewStatus::AwaitingStart);
  }

  #[tokio::test]
  async fn empty_profile_value_is_rejected_without_change() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = SessionContext::new("s1");
    engine.ingest_resume(&mut ctx, "resume", CandidateProfile::default()).await.unwrap();
    let before = ctx.active.clone();

    let err = engine.submit_profile_field(&mut ctx, ProfileField::Name, "   ").await.unwrap_err();
    assert!(matches!(err, InterviewError::Validation(_)));
    assert_eq!(ctx.active, before);

    let err = engine.submit_profile_field(&mut ctx, ProfileField::Name, "Ada").await;
    assert!(err.is_ok());
    let err = engine.submit_profile_field(&mut ctx, ProfileField::Name, "Again").await.unwrap_err();
    assert!(matches!(err, InterviewError::Validation(_)));
  }

  #[tokio::test]
  async fn ingest_rejected_while_interview_unfinished() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = started(&engine).await;
    let err = engine.ingest_resume(&mut ctx, "another", full_profile()).await.unwrap_err();
    assert!(matches!(err, InterviewError::Transition { status: InterviewStatus::InProgress, .. }));
  }

  #[tokio::test]
  async fn start_with_failing_provider_uses_bank() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let ctx = started(&engine).await;
    let rec = ctx.active.as_ref().unwrap();
    assert_eq!(rec.interview.status, InterviewStatus::InProgress);
    assert_eq!(rec.interview.current_question_index, 0);
    assert_eq!(rec.interview.questions.len(), 6);
    let timer = rec.interview.active_timer.as_ref().unwrap();
    assert_eq!(timer.duration_ms, 20_000);
    assert!(!timer.paused);
    let last = rec.chat.last().unwrap();
    assert_eq!(last.kind, MessageKind::Question);
    assert!(last.content.contains(&rec.interview.questions[0].prompt));
  }

  #[tokio::test]
  async fn start_uses_provider_questions_when_valid() {
    let source = QuestionSource::new(Some(Arc::new(PayloadProvider(valid_payload()))), QuestionBank::default(), 1);
    let engine = InterviewEngine::new(Arc::new(MemoryStore::new()), source, Scoring::default(), clock());
    let mut ctx = SessionContext::new("s1");
    engine.ingest_resume(&mut ctx, "resume", full_profile()).await.unwrap();
    let rec = engine.start_interview(&mut ctx).await.unwrap();
    assert_eq!(rec.interview.questions[0].prompt, "What is a closure?");
  }

  #[tokio::test]
  async fn start_requires_awaiting_start() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = SessionContext::new("s1");
    assert!(matches!(engine.start_interview(&mut ctx).await, Err(InterviewError::NoActiveCandidate)));
    engine.ingest_resume(&mut ctx, "resume", CandidateProfile::default()).await.unwrap();
    let err = engine.start_interview(&mut ctx).await.unwrap_err();
    assert!(matches!(err, InterviewError::Transition { status: InterviewStatus::Collecting, .. }));
  }

  #[tokio::test]
  async fn six_answers_complete_the_interview() {
    let c = clock();
    let engine = engine_with(Arc::new(MemoryStore::new()), c.clone());
    let mut ctx = started(&engine).await;

    for i in 0..6 {
      let rec = ctx.active.as_ref().unwrap();
      assert!(rec.summary.is_none());
      let expected_ms = rec.interview.current_question().unwrap().difficulty.duration_ms();
      assert_eq!(rec.interview.active_timer.as_ref().unwrap().duration_ms, expected_ms);

      c.advance_ms(1_000);
      let out = engine.submit_answer(&mut ctx, manual(&format!("answer {} about state and caching", i))).await.unwrap();
      match out {
        SubmitOutcome::Recorded { completed, .. } => assert_eq!(completed, i == 5),
        other => panic!("unexpected {:?}", other),
      }
    }

    let rec = ctx.active.as_ref().unwrap();
    assert_eq!(rec.interview.status, InterviewStatus::Completed);
    assert_eq!(rec.interview.answers.len(), 6);
    assert!(rec.summary.is_some());
    assert!(rec.interview.active_timer.is_none());
    assert_eq!(rec.chat.last().unwrap().kind, MessageKind::Summary);

    let err = engine.submit_answer(&mut ctx, manual("late")).await.unwrap_err();
    assert!(matches!(err, InterviewError::Transition { status: InterviewStatus::Completed, .. }));
  }

  #[tokio::test]
  async fn duplicate_submit_for_same_question_records_once() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = started(&engine).await;
    let q0 = current_id(&ctx);

    let auto = SubmitAnswer { response: "draft".into(), auto_submitted: true, question_id: Some(q0.clone()) };
    let manual_late = SubmitAnswer { response: "final".into(), auto_submitted: false, question_id: Some(q0.clone()) };

    let first = engine.submit_answer(&mut ctx, auto).await.unwrap();
    assert!(matches!(first, SubmitOutcome::Recorded { .. }));
    let second = engine.submit_answer(&mut ctx, manual_late).await.unwrap();
    assert_eq!(second, SubmitOutcome::Ignored { reason: "already_answered" });

    let rec = ctx.active.as_ref().unwrap();
    let for_q0: Vec<&Answer> = rec.interview.answers.iter().filter(|a| a.question_id == q0).collect();
    assert_eq!(for_q0.len(), 1);
    assert_eq!(for_q0[0].response, "draft");
    assert!(for_q0[0].auto_submitted);
    assert_eq!(rec.interview.current_question_index, 1);
  }

  #[tokio::test]
  async fn manual_empty_answer_rejected_but_auto_empty_accepted() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = started(&engine).await;

    let err = engine.submit_answer(&mut ctx, manual("  ")).await.unwrap_err();
    assert!(matches!(err, InterviewError::Validation(_)));
    assert!(ctx.active.as_ref().unwrap().interview.answers.is_empty());

    let auto = SubmitAnswer { response: String::new(), auto_submitted: true, question_id: None };
    engine.submit_answer(&mut ctx, auto).await.unwrap();
    let a = &ctx.active.as_ref().unwrap().interview.answers[0];
    assert_eq!(a.response, "");
    assert_eq!(a.score, 0);
  }

  #[tokio::test]
  async fn submit_while_paused_is_a_transition_error() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = started(&engine).await;
    assert!(engine.pause_interview(&mut ctx).await.unwrap());
    let err = engine.submit_answer(&mut ctx, manual("answer")).await.unwrap_err();
    assert!(matches!(err, InterviewError::Transition { status: InterviewStatus::Paused, .. }));
    assert!(ctx.active.as_ref().unwrap().interview.answers.is_empty());
  }

  #[tokio::test]
  async fn pause_outside_progress_is_a_noop() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = SessionContext::new("s1");
    assert!(!engine.pause_interview(&mut ctx).await.unwrap());

    engine.ingest_resume(&mut ctx, "resume", CandidateProfile::default()).await.unwrap();
    let chat_len = ctx.active.as_ref().unwrap().chat.len();
    assert!(!engine.pause_interview(&mut ctx).await.unwrap());
    assert_eq!(status(&ctx), InterviewStatus::Collecting);
    assert_eq!(ctx.active.as_ref().unwrap().chat.len(), chat_len);
  }

  #[tokio::test]
  async fn pause_resume_round_trip_keeps_remaining_time() {
    let c = clock();
    let engine = engine_with(Arc::new(MemoryStore::new()), c.clone());
    let mut ctx = started(&engine).await;

    c.advance_ms(7_500);
    assert!(engine.pause_interview(&mut ctx).await.unwrap());
    assert!(!engine.pause_interview(&mut ctx).await.unwrap());
    let timer = ctx.active.as_ref().unwrap().interview.active_timer.clone().unwrap();
    assert!(timer.paused);
    assert_eq!(timer.remaining_ms_on_pause, Some(12_500));

    c.advance_ms(600_000);
    let rec = engine.resume_interview(&mut ctx).await.unwrap();
    assert_eq!(rec.interview.status, InterviewStatus::InProgress);
    let timer = rec.interview.active_timer.unwrap();
    assert_eq!(timer.duration_ms, 20_000);
    assert_eq!(remaining_ms(&timer, c.now()), 12_500);

    let err = engine.resume_interview(&mut ctx).await.unwrap_err();
    assert!(matches!(err, InterviewError::Transition { status: InterviewStatus::InProgress, .. }));
  }

  #[tokio::test]
  async fn tick_auto_submits_draft_exactly_once() {
    let c = clock();
    let engine = engine_with(Arc::new(MemoryStore::new()), c.clone());
    let mut ctx = started(&engine).await;
    let q0 = current_id(&ctx);
    ctx.draft = "partial thoughts on scope".into();

    c.advance_ms(19_750);
    assert_eq!(engine.tick(&mut ctx).await.unwrap(), None);

    c.advance_ms(250);
    let out = engine.tick(&mut ctx).await.unwrap();
    assert!(matches!(out, Some(SubmitOutcome::Recorded { ref question_id, .. }) if *question_id == q0));
    assert_eq!(engine.tick(&mut ctx).await.unwrap(), None);

    let rec = ctx.active.as_ref().unwrap();
    assert_eq!(rec.interview.answers.len(), 1);
    assert_eq!(rec.interview.answers[0].response, "partial thoughts on scope");
    assert!(rec.interview.answers[0].auto_submitted);
    assert!(ctx.draft.is_empty());

    // The manual submit that lost the race is ignored.
    let late = SubmitAnswer { response: "final".into(), auto_submitted: false, question_id: Some(q0) };
    assert!(matches!(engine.submit_answer(&mut ctx, late).await.unwrap(), SubmitOutcome::Ignored { .. }));
  }

  #[tokio::test]
  async fn paused_timer_does_not_expire_on_tick() {
    let c = clock();
    let engine = engine_with(Arc::new(MemoryStore::new()), c.clone());
    let mut ctx = started(&engine).await;
    engine.pause_interview(&mut ctx).await.unwrap();
    c.advance_ms(1_000_000);
    assert_eq!(engine.tick(&mut ctx).await.unwrap(), None);
    assert!(ctx.active.as_ref().unwrap().interview.answers.is_empty());
  }

  #[tokio::test]
  async fn scoring_failure_still_completes() {
    let source = QuestionSource::new(None, QuestionBank::default(), 1).with_seed(3);
    let engine = InterviewEngine::new(
      Arc::new(MemoryStore::new()),
      source,
      Scoring::new(Arc::new(BrokenScorer)),
      clock(),
    );
    let mut ctx = SessionContext::new("s1");
    engine.ingest_resume(&mut ctx, "resume", full_profile()).await.unwrap();
    engine.start_interview(&mut ctx).await.unwrap();
    for _ in 0..6 {
      engine.submit_answer(&mut ctx, manual("an answer")).await.unwrap();
    }
    let rec = ctx.active.as_ref().unwrap();
    assert_eq!(rec.interview.status, InterviewStatus::Completed);
    assert!(rec.summary.is_some());
  }

  #[tokio::test]
  async fn failed_write_keeps_state_and_retries() {
    let store = Arc::new(FlakyStore::default());
    let engine = engine_with(store.clone(), clock());
    let mut ctx = started(&engine).await;
    let id = ctx.active.as_ref().unwrap().id.clone();

    store.fail_puts.store(true, Ordering::SeqCst);
    let err = engine.submit_answer(&mut ctx, manual("answer one")).await.unwrap_err();
    assert!(matches!(err, InterviewError::Persistence(_)));
    assert!(ctx.dirty);
    assert_eq!(ctx.active.as_ref().unwrap().interview.answers.len(), 1);
    assert!(store.get(&id).await.unwrap().unwrap().interview.answers.is_empty());

    store.fail_puts.store(false, Ordering::SeqCst);
    assert_eq!(engine.tick(&mut ctx).await.unwrap(), None);
    assert!(!ctx.dirty);
    assert_eq!(store.get(&id).await.unwrap().unwrap().interview.answers.len(), 1);
  }

  #[tokio::test]
  async fn summary_exists_only_when_completed() {
    let engine = engine_with(Arc::new(MemoryStore::new()), clock());
    let mut ctx = started(&engine).await;
    for i in 0..6 {
      let rec = ctx.active.as_ref().unwrap();
      assert_eq!(rec.summary.is_some(), rec.interview.status == InterviewStatus::Completed);
      assert_eq!(rec.interview.answers.len(), i);
      engine.submit_answer(&mut ctx, manual("text")).await.unwrap();
    }
    let rec = ctx.active.as_ref().unwrap();
    assert!(rec.summary.is_some() && rec.interview.answers.len() == 6);
  }
}
