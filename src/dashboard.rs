//! Reviewer dashboard read model over the candidate store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateRecord, InterviewStatus, Progress, ProfileField};

pub const UNKNOWN_CANDIDATE: &str = "Unknown candidate";

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SortBy {
  #[default]
  ScoreDesc,
  ScoreAsc,
  Recent,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRow {
  pub id: String,
  pub name: String,
  pub email: Option<String>,
  pub score: u8,
  pub status: InterviewStatus,
  pub progress: Progress,
  pub updated_at: DateTime<Utc>,
}

impl DashboardRow {
  pub fn of(record: &CandidateRecord) -> Self {
    Self {
      id: record.id.clone(),
      name: record
        .profile
        .get(ProfileField::Name)
        .unwrap_or(UNKNOWN_CANDIDATE)
        .to_string(),
      email: record.profile.get(ProfileField::Email).map(str::to_string),
      score: record.summary.as_ref().map(|s| s.overall_score).unwrap_or(0),
      status: record.interview.status,
      progress: record.progress(),
      updated_at: record.updated_at,
    }
  }

  fn matches(&self, needle: &str) -> bool {
    self.name.to_lowercase().contains(needle)
      || self.email.as_deref().is_some_and(|e| e.to_lowercase().contains(needle))
  }
}

/// Rows filtered by a case-insensitive name/email search, then sorted.
/// Ties fall back to most recent first.
pub fn dashboard_rows(records: &[CandidateRecord], search: Option<&str>, sort: SortBy) -> Vec<DashboardRow> {
  let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
  let mut rows: Vec<DashboardRow> = records
    .iter()
    .map(DashboardRow::of)
    .filter(|row| needle.as_deref().map_or(true, |n| row.matches(n)))
    .collect();

  rows.sort_by(|a, b| {
    let recent = b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id));
    match sort {
      SortBy::ScoreDesc => b.score.cmp(&a.score).then(recent),
      SortBy::ScoreAsc => a.score.cmp(&b.score).then(recent),
      SortBy::Recent => recent,
    }
  });
  rows
}
