//! Answer scoring and interview summaries. Pluggable, trait-based.
//!
//! Default: `KeywordScorer` (pure Rust, deterministic, fully testable).
//! With an API key: `LlmScorer`, wrapped by `Scoring` so that any failure degrades to the
//! keyword heuristic instead of blocking the interview.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::config::Prompts;
use crate::domain::{Answer, CandidateSummary, InterviewQuestion};
use crate::errors::ScoringError;
use crate::openai::OpenAI;
use crate::util::truncate_chars;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerScore {
  pub score: u8,
  pub reasoning: String,
}

#[async_trait]
pub trait AnswerScorer: Send + Sync {
  fn name(&self) -> &'static str;

  async fn score(&self, question: &InterviewQuestion, response: &str) -> Result<AnswerScore, ScoringError>;

  async fn summarize(
    &self,
    candidate_name: Option<&str>,
    questions: &[InterviewQuestion],
    answers: &[Answer],
  ) -> Result<CandidateSummary, ScoringError>;
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordScorer
// ────────────────────────────────────────────────────────────────────────────

/// Keyword-overlap heuristic.
///
/// Score = 80 × (expected keywords mentioned / expected keywords) + up to 20 for depth
/// (one point per three words, capped). Questions without keywords are scored on depth alone.
/// Blank answers score 0.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordScorer;

const COVERAGE_WEIGHT: f32 = 80.0;
const DEPTH_MAX: f32 = 20.0;
const WORDS_PER_DEPTH_POINT: usize = 3;
const STRONG_SCORE: u8 = 70;
const WEAK_SCORE: u8 = 50;

fn keyword_split<'a>(question: &'a InterviewQuestion, response: &str) -> (Vec<&'a str>, Vec<&'a str>) {
  let haystack = response.to_lowercase();
  question
    .expected_keywords
    .iter()
    .map(String::as_str)
    .partition(|kw| haystack.contains(&kw.to_lowercase()))
}

pub fn keyword_score(question: &InterviewQuestion, response: &str) -> AnswerScore {
  let response = response.trim();
  if response.is_empty() {
    return AnswerScore { score: 0, reasoning: "No answer was given.".into() };
  }

  let words = response.split_whitespace().count();
  let depth = ((words / WORDS_PER_DEPTH_POINT) as f32).min(DEPTH_MAX);

  if question.expected_keywords.is_empty() {
    let score = (depth * 5.0).min(100.0).round() as u8;
    return AnswerScore {
      score,
      reasoning: format!("Scored on answer depth ({} words); no expected keywords.", words),
    };
  }

  let (covered, missing) = keyword_split(question, response);
  let coverage = covered.len() as f32 / question.expected_keywords.len() as f32;
  let score = (coverage * COVERAGE_WEIGHT + depth).clamp(0.0, 100.0).round() as u8;

  let mut reasoning = if covered.is_empty() {
    "Mentioned none of the expected concepts.".to_string()
  } else {
    format!("Covered: {}.", covered.join(", "))
  };
  if !missing.is_empty() {
    reasoning.push_str(&format!(" Missing: {}.", missing.join(", ")));
  }
  AnswerScore { score, reasoning }
}

pub fn keyword_summary(questions: &[InterviewQuestion], answers: &[Answer]) -> CandidateSummary {
  let overall_score = if answers.is_empty() {
    0
  } else {
    let total: u32 = answers.iter().map(|a| a.score as u32).sum();
    (total as f32 / answers.len() as f32).round().clamp(0.0, 100.0) as u8
  };

  let mut strengths = Vec::new();
  let mut areas_to_improve = Vec::new();
  for answer in answers {
    let Some(question) = questions.iter().find(|q| q.id == answer.question_id) else {
      continue;
    };
    let topic = truncate_chars(&question.prompt, 60);
    if answer.score >= STRONG_SCORE {
      let (covered, _) = keyword_split(question, &answer.response);
      if covered.is_empty() {
        strengths.push(format!("Strong {} answer: {}", question.difficulty, topic));
      } else {
        strengths.extend(covered.iter().map(|k| k.to_string()));
      }
    } else if answer.score < WEAK_SCORE {
      if answer.auto_submitted && answer.response.trim().is_empty() {
        areas_to_improve.push(format!("Ran out of time on a {} question", question.difficulty));
      } else {
        let (_, missing) = keyword_split(question, &answer.response);
        if missing.is_empty() {
          areas_to_improve.push(format!("Go deeper on: {}", topic));
        } else {
          areas_to_improve.extend(missing.iter().map(|k| k.to_string()));
        }
      }
    }
  }
  dedup_in_order(&mut strengths);
  dedup_in_order(&mut areas_to_improve);

  CandidateSummary {
    overall_score,
    strengths,
    areas_to_improve,
    final_remark: remark_for(overall_score).to_string(),
  }
}

fn remark_for(score: u8) -> &'static str {
  match score {
    80..=100 => "Excellent performance with strong technical depth across difficulty levels.",
    60..=79 => "Good performance; solid fundamentals with a few gaps on harder topics.",
    40..=59 => "Fair performance; core concepts are present but answers need more depth.",
    _ => "Needs improvement; review the fundamentals and practise answering under time pressure.",
  }
}

fn dedup_in_order(items: &mut Vec<String>) {
  let mut seen = HashSet::new();
  items.retain(|s| seen.insert(s.to_lowercase()));
}

#[async_trait]
impl AnswerScorer for KeywordScorer {
  fn name(&self) -> &'static str {
    "keyword"
  }

  async fn score(&self, question: &InterviewQuestion, response: &str) -> Result<AnswerScore, ScoringError> {
    Ok(keyword_score(question, response))
  }

  async fn summarize(
    &self,
    _candidate_name: Option<&str>,
    questions: &[InterviewQuestion],
    answers: &[Answer],
  ) -> Result<CandidateSummary, ScoringError> {
    Ok(keyword_summary(questions, answers))
  }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmScorer
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmScorer {
  pub client: OpenAI,
  pub prompts: Prompts,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptItem<'a> {
  question: &'a str,
  difficulty: &'a str,
  answer: &'a str,
  auto_submitted: bool,
  score: u8,
}

fn clamp_score(raw: f32) -> Result<u8, ScoringError> {
  if !raw.is_finite() {
    return Err(ScoringError::Invalid(format!("score {} is not a number", raw)));
  }
  Ok(raw.clamp(0.0, 100.0).round() as u8)
}

#[async_trait]
impl AnswerScorer for LlmScorer {
  fn name(&self) -> &'static str {
    "openai"
  }

  async fn score(&self, question: &InterviewQuestion, response: &str) -> Result<AnswerScore, ScoringError> {
    if response.trim().is_empty() {
      return Ok(keyword_score(question, response));
    }
    let out = self.client.score_answer(&self.prompts, question, response).await?;
    Ok(AnswerScore { score: clamp_score(out.score)?, reasoning: out.reasoning })
  }

  async fn summarize(
    &self,
    candidate_name: Option<&str>,
    questions: &[InterviewQuestion],
    answers: &[Answer],
  ) -> Result<CandidateSummary, ScoringError> {
    let transcript: Vec<TranscriptItem> = answers
      .iter()
      .filter_map(|a| {
        questions.iter().find(|q| q.id == a.question_id).map(|q| TranscriptItem {
          question: &q.prompt,
          difficulty: q.difficulty.as_str(),
          answer: &a.response,
          auto_submitted: a.auto_submitted,
          score: a.score,
        })
      })
      .collect();
    let transcript_json =
      serde_json::to_string(&transcript).map_err(|e| ScoringError::Invalid(e.to_string()))?;
    let out = self
      .client
      .summarize(&self.prompts, candidate_name.unwrap_or("Unknown candidate"), &transcript_json)
      .await?;
    if out.final_remark.trim().is_empty() {
      return Err(ScoringError::Invalid("summary without final remark".into()));
    }
    Ok(CandidateSummary {
      overall_score: clamp_score(out.overall_score)?,
      strengths: out.strengths,
      areas_to_improve: out.areas_to_improve,
      final_remark: out.final_remark,
    })
  }
}

// ────────────────────────────────────────────────────────────────────────────
// Fallback policy
// ────────────────────────────────────────────────────────────────────────────

/// Primary scorer with the keyword heuristic behind it. Never fails.
#[derive(Clone)]
pub struct Scoring {
  primary: Arc<dyn AnswerScorer>,
}

impl Default for Scoring {
  fn default() -> Self {
    Self::new(Arc::new(KeywordScorer))
  }
}

impl Scoring {
  pub fn new(primary: Arc<dyn AnswerScorer>) -> Self {
    Self { primary }
  }

  pub fn primary_name(&self) -> &'static str {
    self.primary.name()
  }

  pub async fn score(&self, question: &InterviewQuestion, response: &str) -> AnswerScore {
    match self.primary.score(question, response).await {
      Ok(s) => s,
      Err(e) => {
        warn!(target: "interview", scorer = self.primary.name(), question_id = %question.id, error = %e, "Scoring failed; using keyword heuristic");
        keyword_score(question, response)
      }
    }
  }

  pub async fn summarize(
    &self,
    candidate_name: Option<&str>,
    questions: &[InterviewQuestion],
    answers: &[Answer],
  ) -> CandidateSummary {
    match self.primary.summarize(candidate_name, questions, answers).await {
      Ok(s) => s,
      Err(e) => {
        warn!(target: "interview", scorer = self.primary.name(), error = %e, "Summary failed; using keyword heuristic");
        keyword_summary(questions, answers)
      }
    }
  }
}
