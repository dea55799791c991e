//! Session Coordinator.
//!
//! A session stands in for one browser tab. It owns an explicit `SessionContext` holding the
//! active candidate, the candidate's unsent draft and the expiry latch. Transitions receive
//! the context by `&mut` while the caller holds the session mutex, which makes every
//! transition on one session single-writer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{CandidateRecord, InterviewStatus};
use crate::errors::InterviewError;
use crate::interview::InterviewEngine;
use crate::store::SharedStore;
use crate::timer::ExpiryLatch;

#[derive(Debug)]
pub struct SessionContext {
  pub id: String,
  /// Cached copy of the active candidate. Authoritative while `dirty`.
  pub active: Option<CandidateRecord>,
  pub dirty: bool,
  /// Latest unsent answer text; used by a timer-expiry auto-submit.
  pub draft: String,
  pub latch: ExpiryLatch,
  /// Set when the active candidate was found paused; cleared by resume or restart.
  pub welcome_back: bool,
  /// Last request or socket message seen for this session.
  pub last_seen: DateTime<Utc>,
  /// Open WebSocket connections; a connected session is never idle.
  pub sockets: usize,
}

impl SessionContext {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      active: None,
      dirty: false,
      draft: String::new(),
      latch: ExpiryLatch::default(),
      welcome_back: false,
      last_seen: DateTime::<Utc>::default(),
      sockets: 0,
    }
  }

  pub fn touch(&mut self, now: DateTime<Utc>) {
    self.last_seen = now;
  }

  pub fn is_idle(&self, now: DateTime<Utc>, idle_ms: u64) -> bool {
    self.sockets == 0 && (now - self.last_seen).num_milliseconds() >= idle_ms as i64
  }

  /// Make `record` the active candidate. The caller persists it.
  pub fn bind(&mut self, record: CandidateRecord) {
    self.active = Some(record);
    self.dirty = true;
    self.draft.clear();
    self.latch.reset();
    self.welcome_back = false;
  }

  /// Drop the active candidate. Its stored record is left as is.
  pub fn clear_active(&mut self) {
    self.active = None;
    self.dirty = false;
    self.draft.clear();
    self.latch.reset();
    self.welcome_back = false;
  }

  pub fn active_id(&self) -> Option<&str> {
    self.active.as_ref().map(|r| r.id.as_str())
  }

  pub fn active_status(&self) -> Option<InterviewStatus> {
    self.active.as_ref().map(|r| r.interview.status)
  }
}

pub type SessionHandle = Arc<Mutex<SessionContext>>;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WelcomeBackChoice {
  Resume,
  Restart,
}

pub struct SessionCoordinator {
  sessions: RwLock<HashMap<String, SessionHandle>>,
  /// candidate id -> session id of the one session allowed to drive it
  owners: RwLock<HashMap<String, String>>,
  /// Serializes candidate hand-over between sessions.
  handover: Mutex<()>,
  engine: Arc<InterviewEngine>,
  store: SharedStore,
}

impl SessionCoordinator {
  pub fn new(engine: Arc<InterviewEngine>, store: SharedStore) -> Self {
    Self {
      sessions: RwLock::new(HashMap::new()),
      owners: RwLock::new(HashMap::new()),
      handover: Mutex::new(()),
      engine,
      store,
    }
  }

  pub fn engine(&self) -> &InterviewEngine {
    &self.engine
  }

  pub fn store(&self) -> &SharedStore {
    &self.store
  }

  /// Register a new session, optionally binding an existing candidate.
  #[instrument(level = "info", skip(self))]
  pub async fn open(&self, candidate_id: Option<&str>) -> Result<(String, SessionHandle), InterviewError> {
    let id = Uuid::new_v4().to_string();
    let mut ctx = SessionContext::new(id.clone());
    ctx.touch(self.engine.clock().now());
    if let Some(cid) = candidate_id {
      let _handover = self.handover.lock().await;
      self.take_over(cid, &id).await?;
      self.attach(&mut ctx, cid).await?;
    }
    let handle = Arc::new(Mutex::new(ctx));
    self.sessions.write().await.insert(id.clone(), handle.clone());
    info!(target: "interview_backend", session = %id, candidate_id = ?candidate_id, "Session opened");
    Ok((id, handle))
  }

  pub async fn get(&self, id: &str) -> Option<SessionHandle> {
    self.sessions.read().await.get(id).cloned()
  }

  pub async fn all(&self) -> Vec<SessionHandle> {
    self.sessions.read().await.values().cloned().collect()
  }

  /// Drop a session from the registry along with the candidates it owned.
  pub async fn remove(&self, id: &str) -> bool {
    let removed = self.sessions.write().await.remove(id).is_some();
    self.owners.write().await.retain(|_, owner| owner != id);
    if removed {
      info!(target: "interview_backend", session = %id, "Session closed");
    }
    removed
  }

  /// Record `ctx` as the session driving its active candidate.
  pub async fn claim(&self, ctx: &SessionContext) {
    if let Some(cid) = ctx.active_id() {
      self.owners.write().await.insert(cid.to_string(), ctx.id.clone());
    }
  }

  async fn release(&self, session_id: &str, candidate_id: &str) {
    let mut owners = self.owners.write().await;
    if owners.get(candidate_id).map(String::as_str) == Some(session_id) {
      owners.remove(candidate_id);
    }
  }

  /// Take `candidate_id` away from whichever other session drives it. Its interview is paused
  /// and written back first, so the new owner loads the latest record.
  async fn take_over(&self, candidate_id: &str, new_owner: &str) -> Result<(), InterviewError> {
    let previous = self.owners.read().await.get(candidate_id).cloned();
    let Some(previous) = previous.filter(|p| p != new_owner) else {
      return Ok(());
    };
    let Some(handle) = self.get(&previous).await else {
      return Ok(());
    };
    let mut other = handle.lock().await;
    if other.active_id() != Some(candidate_id) {
      return Ok(());
    }
    self.engine.pause_interview(&mut other).await?;
    other.clear_active();
    self.owners.write().await.insert(candidate_id.to_string(), new_owner.to_string());
    info!(target: "interview", %candidate_id, from = %previous, to = %new_owner, "Candidate handed over to another session");
    Ok(())
  }

  /// Switch the session to a stored candidate.
  ///
  /// An in-progress interview being switched away from is paused first. A candidate found
  /// in progress (left running by a closed tab) is paused on load, and any paused candidate
  /// raises the welcome-back prompt. Only called for sessions that are not registered yet, so
  /// no other session lock is held while `take_over` waits on the previous owner.
  #[instrument(level = "info", skip(self, ctx), fields(session = %ctx.id))]
  async fn attach(&self, ctx: &mut SessionContext, candidate_id: &str) -> Result<(), InterviewError> {
    if ctx.active_id() == Some(candidate_id) {
      return Ok(());
    }
    let record = self
      .store
      .get(candidate_id)
      .await?
      .ok_or_else(|| InterviewError::CandidateNotFound(candidate_id.to_string()))?;

    if ctx.active_status() == Some(InterviewStatus::InProgress) {
      self.engine.pause_interview(ctx).await?;
    } else if ctx.dirty {
      self.engine.persist(ctx).await?;
    }

    ctx.bind(record);
    ctx.dirty = false;
    if ctx.active_status() == Some(InterviewStatus::InProgress) {
      self.engine.pause_interview(ctx).await?;
    }
    ctx.welcome_back = welcome_back_applies(ctx);
    self.claim(ctx).await;
    info!(target: "interview", session = %ctx.id, %candidate_id, welcome_back = ctx.welcome_back, "Candidate attached");
    Ok(())
  }

  /// Answer the welcome-back prompt: resume the paused interview or start fresh.
  #[instrument(level = "info", skip(self, ctx), fields(session = %ctx.id))]
  pub async fn resolve_welcome_back(
    &self,
    ctx: &mut SessionContext,
    choice: WelcomeBackChoice,
  ) -> Result<(), InterviewError> {
    let status = ctx.active_status().ok_or(InterviewError::NoActiveCandidate)?;
    if status != InterviewStatus::Paused {
      return Err(InterviewError::Transition { action: "answer the welcome back prompt", status });
    }
    match choice {
      WelcomeBackChoice::Resume => {
        self.engine.resume_interview(ctx).await?;
      }
      WelcomeBackChoice::Restart => {
        self.engine.persist(ctx).await?;
        if let Some(cid) = ctx.active_id().map(str::to_string) {
          info!(target: "interview", session = %ctx.id, candidate_id = %cid, "Starting fresh; paused candidate kept in store");
          self.release(&ctx.id, &cid).await;
        }
        ctx.clear_active();
      }
    }
    ctx.welcome_back = false;
    Ok(())
  }

  /// Environment teardown (tab close, socket close): pause a running interview and drop the
  /// session. A reload opens a new session on the stored candidate.
  #[instrument(level = "info", skip(self, ctx), fields(session = %ctx.id))]
  pub async fn teardown(&self, ctx: &mut SessionContext) -> Result<bool, InterviewError> {
    let paused = self.engine.pause_interview(ctx).await?;
    ctx.welcome_back = welcome_back_applies(ctx);
    if paused {
      info!(target: "interview", session = %ctx.id, "Paused on teardown");
    }
    self.remove(&ctx.id).await;
    Ok(paused)
  }

  /// Tear down sessions with no socket and no request for `idle_ms`. Busy sessions are
  /// skipped; a session whose pause could not be written stays registered for the next pass.
  pub async fn evict_idle(&self, idle_ms: u64) -> usize {
    let now = self.engine.clock().now();
    let mut evicted = 0;
    for handle in self.all().await {
      let Ok(mut ctx) = handle.try_lock() else {
        continue;
      };
      if !ctx.is_idle(now, idle_ms) {
        continue;
      }
      match self.teardown(&mut ctx).await {
        Ok(paused) => {
          info!(target: "interview_backend", session = %ctx.id, paused, "Idle session evicted");
          evicted += 1;
        }
        Err(e) => warn!(target: "interview_backend", session = %ctx.id, error = %e, "Idle session kept; pause not written"),
      }
    }
    evicted
  }
}

fn welcome_back_applies(ctx: &SessionContext) -> bool {
  ctx.active_status() == Some(InterviewStatus::Paused)
}
