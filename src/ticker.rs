//! Server-side timer driving: a periodic task ticks every live session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::interview::SubmitOutcome;
use crate::session::SessionContext;
use crate::state::AppState;

pub fn spawn_ticker(state: Arc<AppState>, interval_ms: u64) -> JoinHandle<()> {
  info!(target: "interview_backend", interval_ms, "Timer ticker started");
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
      interval.tick().await;
      // Tick tasks are detached; a slow one only holds its own session's lock.
      dispatch_ticks(&state).await;
    }
  })
}

/// One pass: tear down idle sessions, then tick every free session on its own task.
/// Busy sessions are skipped and picked up by a later pass. Each task yields whether it
/// auto-submitted an answer.
pub async fn dispatch_ticks(state: &Arc<AppState>) -> Vec<JoinHandle<bool>> {
  let evicted = state.sessions.evict_idle(state.settings.session_idle_ms).await;
  if evicted > 0 {
    debug!(target: "interview_backend", evicted, "Idle sessions evicted");
  }

  let mut tasks = Vec::new();
  for handle in state.sessions.all().await {
    let Ok(ctx) = handle.try_lock_owned() else {
      continue;
    };
    let state = state.clone();
    tasks.push(tokio::spawn(async move { tick_session(&state, ctx).await }));
  }
  tasks
}

async fn tick_session(state: &AppState, mut ctx: OwnedMutexGuard<SessionContext>) -> bool {
  match state.engine().tick(&mut ctx).await {
    Ok(Some(SubmitOutcome::Recorded { .. })) => true,
    Ok(Some(SubmitOutcome::Ignored { reason })) => {
      debug!(target: "interview", session = %ctx.id, reason, "Expiry auto-submit ignored");
      false
    }
    Ok(None) => false,
    Err(e) => {
      warn!(target: "interview", session = %ctx.id, error = %e, "Tick failed; will retry");
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Settings;
  use crate::domain::{Answer, CandidateProfile, CandidateSummary, InterviewQuestion, InterviewStatus};
  use crate::errors::ScoringError;
  use crate::questions::QuestionSource;
  use crate::scoring::{AnswerScore, AnswerScorer, KeywordScorer, Scoring};
  use crate::seeds::QuestionBank;
  use crate::session::WelcomeBackChoice;
  use crate::state::tests::offline_state;
  use crate::store::MemoryStore;
  use crate::timer::ManualClock;
  use async_trait::async_trait;
  use chrono::{TimeZone, Utc};
  use tokio::sync::Notify;

  /// Keyword scoring, except answers reading "stall" wait for the gate to open.
  struct GatedScorer {
    gate: Arc<Notify>,
  }

  #[async_trait]
  impl AnswerScorer for GatedScorer {
    fn name(&self) -> &'static str {
      "gated"
    }
    async fn score(&self, question: &InterviewQuestion, response: &str) -> Result<AnswerScore, ScoringError> {
      if response == "stall" {
        self.gate.notified().await;
      }
      KeywordScorer.score(question, response).await
    }
    async fn summarize(
      &self,
      candidate_name: Option<&str>,
      questions: &[InterviewQuestion],
      answers: &[Answer],
    ) -> Result<CandidateSummary, ScoringError> {
      KeywordScorer.summarize(candidate_name, questions, answers).await
    }
  }

  /// Runs one pass and waits for every tick task; returns the auto-submit count.
  async fn run_tick(state: &Arc<AppState>) -> usize {
    let mut auto_submitted = 0;
    for task in dispatch_ticks(state).await {
      if task.await.unwrap() {
        auto_submitted += 1;
      }
    }
    auto_submitted
  }

  fn profile() -> CandidateProfile {
    CandidateProfile {
      name: Some("Lin".into()),
      email: Some("lin@example.com".into()),
      phone: Some("5551234567".into()),
    }
  }

  async fn started(state: &Arc<AppState>) -> (String, crate::session::SessionHandle) {
    let (id, handle) = state.sessions.open(None).await.unwrap();
    {
      let mut ctx = handle.lock().await;
      state.engine().ingest_resume(&mut ctx, "resume", profile()).await.unwrap();
      state.engine().start_interview(&mut ctx).await.unwrap();
      state.sessions.claim(&ctx).await;
    }
    (id, handle)
  }

  #[tokio::test]
  async fn expired_question_is_auto_submitted_once() {
    let (state, clock) = offline_state();
    let (_, handle) = started(&state).await;
    handle.lock().await.draft = "half an answer".into();

    assert_eq!(run_tick(&state).await, 0);
    clock.advance_ms(20_000);
    assert_eq!(run_tick(&state).await, 1);
    assert_eq!(run_tick(&state).await, 0);

    let ctx = handle.lock().await;
    let record = ctx.active.as_ref().unwrap();
    assert_eq!(record.interview.status, InterviewStatus::InProgress);
    assert_eq!(record.interview.answers.len(), 1);
    assert!(record.interview.answers[0].auto_submitted);
    assert_eq!(record.interview.answers[0].response, "half an answer");
  }

  #[tokio::test]
  async fn locked_sessions_are_skipped() {
    let (state, clock) = offline_state();
    let (_, handle) = state.sessions.open(None).await.unwrap();
    let _guard = handle.lock().await;
    clock.advance_ms(1_000_000);
    assert_eq!(run_tick(&state).await, 0);
  }

  #[tokio::test]
  async fn abandoned_session_is_paused_not_run_down() {
    let (state, clock) = offline_state();
    let (id, handle) = started(&state).await;
    let candidate_id = handle.lock().await.active_id().unwrap().to_string();

    for _ in 0..6 {
      clock.advance_ms(120_000);
      assert_eq!(run_tick(&state).await, 0);
    }
    assert!(state.sessions.get(&id).await.is_none());
    assert!(state.sessions.all().await.is_empty());

    let stored = state.store().get(&candidate_id).await.unwrap().unwrap();
    assert_eq!(stored.interview.status, InterviewStatus::Paused);
    assert!(stored.interview.answers.is_empty());

    let (_, reopened) = state.sessions.open(Some(&candidate_id)).await.unwrap();
    assert!(reopened.lock().await.welcome_back);
  }

  #[tokio::test]
  async fn only_the_latest_session_drives_a_candidate() {
    let (state, clock) = offline_state();
    let (_, first) = started(&state).await;
    let candidate_id = first.lock().await.active_id().unwrap().to_string();

    let (_, second) = state.sessions.open(Some(&candidate_id)).await.unwrap();
    {
      let mut ctx = second.lock().await;
      state.sessions.resolve_welcome_back(&mut ctx, WelcomeBackChoice::Resume).await.unwrap();
    }
    assert!(first.lock().await.active.is_none());

    clock.advance_ms(20_000);
    assert_eq!(run_tick(&state).await, 1);
    let ctx = second.lock().await;
    assert_eq!(ctx.active.as_ref().unwrap().interview.answers.len(), 1);
  }

  #[tokio::test]
  async fn slow_auto_submit_does_not_hold_up_other_sessions() {
    let gate = Arc::new(Notify::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap());
    let state = Arc::new(AppState::assemble(
      Settings::default(),
      Arc::new(MemoryStore::new()),
      QuestionSource::new(None, QuestionBank::default(), 1).with_seed(3),
      Scoring::new(Arc::new(GatedScorer { gate: gate.clone() })),
      clock.clone(),
    ));
    let (_, slow) = started(&state).await;
    let (_, fast) = started(&state).await;
    slow.lock().await.draft = "stall".into();
    fast.lock().await.draft = "closures capture scope".into();

    clock.advance_ms(20_000);
    let tasks = dispatch_ticks(&state).await;
    assert_eq!(tasks.len(), 2);

    let done = tokio::time::timeout(Duration::from_secs(5), fast.lock()).await.unwrap();
    assert_eq!(done.active.as_ref().unwrap().interview.answers.len(), 1);
    drop(done);
    assert!(slow.try_lock().is_err());

    gate.notify_one();
    for task in tasks {
      assert!(task.await.unwrap());
    }
    assert_eq!(slow.lock().await.active.as_ref().unwrap().interview.answers.len(), 1);
  }
}
