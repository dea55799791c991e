//! Question countdown: pure derivations over `ActiveTimerState` plus an expiry latch.
//!
//! There is no scheduling in here. Something external (the `ticker` task, a WS status poll)
//! asks "how much time is left at `now`?" and the answer only depends on the stored state
//! and the clock reading passed in.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::ActiveTimerState;

/// Wall clock boundary. All timer math reads time through this.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

pub type SharedClock = Arc<dyn Clock>;

/// A fresh, running countdown.
pub fn start_timer(duration_ms: i64, now: DateTime<Utc>) -> ActiveTimerState {
  ActiveTimerState {
    duration_ms,
    started_at: Some(now),
    paused: false,
    remaining_ms_on_pause: None,
  }
}

/// Remaining milliseconds at `now`, never negative.
pub fn remaining_ms(timer: &ActiveTimerState, now: DateTime<Utc>) -> i64 {
  if timer.paused {
    return timer.remaining_ms_on_pause.unwrap_or(timer.duration_ms).max(0);
  }
  match timer.started_at {
    Some(started) => {
      let elapsed = (now - started).num_milliseconds();
      (timer.duration_ms - elapsed).max(0)
    }
    None => timer.duration_ms.max(0),
  }
}

pub fn is_expired(timer: &ActiveTimerState, now: DateTime<Utc>) -> bool {
  !timer.paused && remaining_ms(timer, now) <= 0
}

/// Freeze the countdown. Pausing a paused timer changes nothing.
pub fn pause_timer(timer: &mut ActiveTimerState, now: DateTime<Utc>) {
  if timer.paused {
    return;
  }
  let remaining = remaining_ms(timer, now);
  timer.remaining_ms_on_pause = Some(remaining);
  timer.paused = true;
  timer.started_at = None;
}

/// Restart from the frozen remaining time.
///
/// `duration_ms` is kept; `started_at` is backdated by the time already consumed so the
/// remaining time at `now` equals what was frozen.
pub fn resume_timer(timer: &mut ActiveTimerState, now: DateTime<Utc>) {
  if !timer.paused {
    return;
  }
  let remaining = timer.remaining_ms_on_pause.unwrap_or(timer.duration_ms).clamp(0, timer.duration_ms);
  let consumed = timer.duration_ms - remaining;
  timer.started_at = Some(now - Duration::milliseconds(consumed));
  timer.paused = false;
  timer.remaining_ms_on_pause = None;
}

/// Reports expiry at most once per question, however often it is polled.
#[derive(Clone, Debug, Default)]
pub struct ExpiryLatch {
  fired_for: Option<String>,
}

impl ExpiryLatch {
  /// True exactly once: the first observation of `question_id`'s timer at or past zero.
  pub fn observe(&mut self, question_id: &str, timer: &ActiveTimerState, now: DateTime<Utc>) -> bool {
    if self.fired_for.as_deref() == Some(question_id) {
      return false;
    }
    if is_expired(timer, now) {
      self.fired_for = Some(question_id.to_string());
      return true;
    }
    false
  }

  pub fn has_fired_for(&self, question_id: &str) -> bool {
    self.fired_for.as_deref() == Some(question_id)
  }

  pub fn reset(&mut self) {
    self.fired_for = None;
  }
}

/// View of a timer at one instant.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
  pub duration_ms: i64,
  pub remaining_ms: i64,
  pub paused: bool,
  pub expired: bool,
}

impl TimerSnapshot {
  pub fn of(timer: &ActiveTimerState, now: DateTime<Utc>) -> Self {
    Self {
      duration_ms: timer.duration_ms,
      remaining_ms: remaining_ms(timer, now),
      paused: timer.paused,
      expired: is_expired(timer, now),
    }
  }
}

/// Hand-driven clock for tests.
#[cfg(test)]
pub struct ManualClock {
  now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Arc<Self> {
    Arc::new(Self { now: std::sync::Mutex::new(start) })
  }

  pub fn advance_ms(&self, ms: i64) {
    let mut now = self.now.lock().unwrap();
    *now = *now + Duration::milliseconds(ms);
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap()
  }
}
