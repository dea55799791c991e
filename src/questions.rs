//! Question Source: six ordered questions per interview, from the AI provider or the fallback bank.
//!
//! `QuestionSource::generate_or_fallback` never fails. Any provider problem (transport, empty
//! output, malformed JSON, too few questions, wrong tier layout) is logged with its reason and
//! the bank is used instead.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{
  expected_layout, CandidateProfile, Difficulty, InterviewQuestion, MAX_EXPECTED_KEYWORDS,
  QUESTIONS_PER_INTERVIEW,
};
use crate::errors::ProviderError;
use crate::openai::OpenAI;
use crate::seeds::QuestionBank;

/// Primary question path. Implementations may fail; the source recovers.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
  fn name(&self) -> &'static str;

  async fn generate(
    &self,
    profile: &CandidateProfile,
    resume_text: &str,
  ) -> Result<Vec<InterviewQuestion>, ProviderError>;
}

/// OpenAI-backed provider.
pub struct OpenAiQuestions {
  pub client: OpenAI,
  pub prompts: Prompts,
}

#[async_trait]
impl QuestionProvider for OpenAiQuestions {
  fn name(&self) -> &'static str {
    "openai"
  }

  async fn generate(
    &self,
    profile: &CandidateProfile,
    resume_text: &str,
  ) -> Result<Vec<InterviewQuestion>, ProviderError> {
    let text = self.client.generate_questions(&self.prompts, profile, resume_text).await?;
    parse_question_payload(&text)
  }
}

#[derive(Deserialize)]
struct Payload {
  #[serde(default)]
  questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
  #[serde(default)]
  prompt: String,
  #[serde(default)]
  difficulty: String,
  #[serde(default)]
  expected_keywords: Option<Vec<String>>,
}

/// Free-text difficulty label to tier, by substring: "hard", then "medium", else easy.
pub fn normalize_difficulty(label: &str) -> Difficulty {
  let lowered = label.to_lowercase();
  if lowered.contains("hard") {
    Difficulty::Hard
  } else if lowered.contains("medium") {
    Difficulty::Medium
  } else {
    Difficulty::Easy
  }
}

/// Parse a `{ "questions": [...] }` payload into exactly six questions in tier order.
pub fn parse_question_payload(text: &str) -> Result<Vec<InterviewQuestion>, ProviderError> {
  if text.trim().is_empty() {
    return Err(ProviderError::EmptyContent);
  }
  let payload: Payload = serde_json::from_str(text)?;
  let usable: Vec<RawQuestion> = payload
    .questions
    .into_iter()
    .filter(|q| !q.prompt.trim().is_empty())
    .collect();

  if usable.len() < QUESTIONS_PER_INTERVIEW {
    return Err(ProviderError::TooFewQuestions(usable.len()));
  }

  let mut questions: Vec<InterviewQuestion> = usable
    .into_iter()
    .take(QUESTIONS_PER_INTERVIEW)
    .map(|q| {
      let mut keywords: Vec<String> = q
        .expected_keywords
        .unwrap_or_default()
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
      keywords.truncate(MAX_EXPECTED_KEYWORDS);
      InterviewQuestion {
        id: Uuid::new_v4().to_string(),
        prompt: q.prompt.trim().to_string(),
        difficulty: normalize_difficulty(&q.difficulty),
        expected_keywords: keywords,
      }
    })
    .collect();

  // Stable: generation order is kept inside each tier.
  questions.sort_by_key(|q| q.difficulty);
  let layout: Vec<Difficulty> = questions.iter().map(|q| q.difficulty).collect();
  if layout != expected_layout() {
    return Err(ProviderError::TierLayout);
  }
  Ok(questions)
}

/// Where a question set came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestionOrigin {
  Provider { name: &'static str, attempt: u32 },
  Fallback { reason: String },
}

impl QuestionOrigin {
  pub fn label(&self) -> &'static str {
    match self {
      QuestionOrigin::Provider { .. } => "provider_generated",
      QuestionOrigin::Fallback { .. } => "fallback_bank",
    }
  }
}

#[derive(Clone, Debug)]
pub struct GeneratedQuestions {
  pub questions: Vec<InterviewQuestion>,
  pub origin: QuestionOrigin,
}

pub struct QuestionSource {
  provider: Option<Arc<dyn QuestionProvider>>,
  bank: QuestionBank,
  attempts: u32,
  rng: Mutex<StdRng>,
}

impl QuestionSource {
  pub fn new(provider: Option<Arc<dyn QuestionProvider>>, bank: QuestionBank, attempts: u32) -> Self {
    Self {
      provider,
      bank,
      attempts: attempts.max(1),
      rng: Mutex::new(StdRng::from_entropy()),
    }
  }

  /// Deterministic fallback sampling.
  pub fn with_seed(mut self, seed: u64) -> Self {
    self.rng = Mutex::new(StdRng::seed_from_u64(seed));
    self
  }

  pub fn provider_name(&self) -> Option<&'static str> {
    self.provider.as_ref().map(|p| p.name())
  }

  pub fn bank(&self) -> &QuestionBank {
    &self.bank
  }

  /// Always six questions in tier order.
  #[instrument(level = "info", skip_all, fields(resume_len = resume_text.len(), attempts = self.attempts))]
  pub async fn generate_or_fallback(&self, profile: &CandidateProfile, resume_text: &str) -> GeneratedQuestions {
    let reason = match &self.provider {
      Some(provider) => {
        let mut last_error = None;
        for attempt in 1..=self.attempts {
          match provider.generate(profile, resume_text).await {
            Ok(questions) => {
              info!(target: "interview", provider = provider.name(), attempt, "Questions generated by provider");
              return GeneratedQuestions {
                questions,
                origin: QuestionOrigin::Provider { name: provider.name(), attempt },
              };
            }
            Err(e) => {
              warn!(target: "interview", provider = provider.name(), attempt, error = %e, "Question generation attempt failed");
              last_error = Some(e);
            }
          }
        }
        last_error
          .map(|e| e.to_string())
          .unwrap_or_else(|| "provider produced no result".to_string())
      }
      None => ProviderError::Disabled.to_string(),
    };

    let questions = self.draw_fallback();
    warn!(target: "interview", %reason, source = "fallback_bank", "Falling back to local question bank");
    GeneratedQuestions { questions, origin: QuestionOrigin::Fallback { reason } }
  }

  fn draw_fallback(&self) -> Vec<InterviewQuestion> {
    // Poisoned only if a draw panicked; the rng is still valid.
    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
    self.bank.draw(&mut *rng)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  /// Provider that always errors; counts calls.
  pub struct FailingProvider {
    pub calls: AtomicU32,
  }

  impl FailingProvider {
    pub fn new() -> Self {
      Self { calls: AtomicU32::new(0) }
    }
  }

  #[async_trait]
  impl QuestionProvider for FailingProvider {
    fn name(&self) -> &'static str {
      "failing"
    }
    async fn generate(&self, _: &CandidateProfile, _: &str) -> Result<Vec<InterviewQuestion>, ProviderError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Err(ProviderError::Api { status: 503, message: "unavailable".into() })
    }
  }

  /// Provider that returns a fixed payload through the real parser.
  pub struct PayloadProvider(pub String);

  #[async_trait]
  impl QuestionProvider for PayloadProvider {
    fn name(&self) -> &'static str {
      "payload"
    }
    async fn generate(&self, _: &CandidateProfile, _: &str) -> Result<Vec<InterviewQuestion>, ProviderError> {
      parse_question_payload(&self.0)
    }
  }

  pub fn valid_payload() -> String {
    serde_json::json!({
      "questions": [
        { "prompt": "What is a closure?", "difficulty": "Easy", "expectedKeywords": ["scope", "function"] },
        { "prompt": "What is the virtual DOM?", "difficulty": "easy", "expectedKeywords": ["diff"] },
        { "prompt": "How does useEffect cleanup work?", "difficulty": "Medium difficulty", "expectedKeywords": ["unmount"] },
        { "prompt": "Explain Node streams.", "difficulty": "medium", "expectedKeywords": ["backpressure", "pipe"] },
        { "prompt": "Design a job queue.", "difficulty": "HARD", "expectedKeywords": ["retry", "idempotency"] },
        { "prompt": "Scale a websocket service.", "difficulty": "hard", "expectedKeywords": ["sticky", "pubsub"] },
        { "prompt": "Extra question.", "difficulty": "hard" }
      ]
    })
    .to_string()
  }

  #[test]
  fn normalizes_difficulty_labels() {
    assert_eq!(normalize_difficulty("HARD"), Difficulty::Hard);
    assert_eq!(normalize_difficulty("medium-hard"), Difficulty::Hard);
    assert_eq!(normalize_difficulty("Medium"), Difficulty::Medium);
    assert_eq!(normalize_difficulty("beginner"), Difficulty::Easy);
    assert_eq!(normalize_difficulty(""), Difficulty::Easy);
  }

  #[test]
  fn parses_first_six_in_layout() {
    let qs = parse_question_payload(&valid_payload()).unwrap();
    assert_eq!(qs.len(), 6);
    let layout: Vec<Difficulty> = qs.iter().map(|q| q.difficulty).collect();
    assert_eq!(layout, expected_layout().to_vec());
    assert_eq!(qs[0].prompt, "What is a closure?");
    assert!(qs.iter().all(|q| q.prompt != "Extra question."));
  }

  #[test]
  fn groups_interleaved_tiers_keeping_generation_order() {
    let payload = serde_json::json!({
      "questions": [
        { "prompt": "h1", "difficulty": "hard" },
        { "prompt": "e1", "difficulty": "easy" },
        { "prompt": "m1", "difficulty": "medium" },
        { "prompt": "e2", "difficulty": "easy" },
        { "prompt": "h2", "difficulty": "hard" },
        { "prompt": "m2", "difficulty": "medium" }
      ]
    })
    .to_string();
    let qs = parse_question_payload(&payload).unwrap();
    let prompts: Vec<&str> = qs.iter().map(|q| q.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["e1", "e2", "m1", "m2", "h1", "h2"]);
  }

  #[test]
  fn truncates_keywords_to_six() {
    let many: Vec<String> = (0..10).map(|i| format!("k{}", i)).collect();
    let mut v: serde_json::Value = serde_json::from_str(&valid_payload()).unwrap();
    v["questions"][0]["expectedKeywords"] = serde_json::json!(many);
    let qs = parse_question_payload(&v.to_string()).unwrap();
    assert_eq!(qs[0].expected_keywords.len(), 6);
    assert_eq!(qs[0].expected_keywords[5], "k5");
  }

  #[test]
  fn rejects_bad_payloads() {
    assert!(matches!(parse_question_payload("  "), Err(ProviderError::EmptyContent)));
    assert!(matches!(parse_question_payload("{not json"), Err(ProviderError::Parse(_))));
    assert!(matches!(
      parse_question_payload(r#"{"questions":[{"prompt":"a","difficulty":"easy"}]}"#),
      Err(ProviderError::TooFewQuestions(1))
    ));
    assert!(matches!(parse_question_payload("{}"), Err(ProviderError::TooFewQuestions(0))));

    let all_easy = serde_json::json!({
      "questions": (0..6).map(|i| serde_json::json!({ "prompt": format!("q{}", i), "difficulty": "easy" })).collect::<Vec<_>>()
    })
    .to_string();
    assert!(matches!(parse_question_payload(&all_easy), Err(ProviderError::TierLayout)));
  }

  #[tokio::test]
  async fn uses_provider_when_it_succeeds() {
    let src = QuestionSource::new(Some(Arc::new(PayloadProvider(valid_payload()))), QuestionBank::default(), 2);
    let out = src.generate_or_fallback(&CandidateProfile::default(), "resume").await;
    assert_eq!(out.origin, QuestionOrigin::Provider { name: "payload", attempt: 1 });
    assert_eq!(out.questions[0].prompt, "What is a closure?");
  }

  #[tokio::test]
  async fn falls_back_after_all_attempts_fail() {
    let failing = Arc::new(FailingProvider::new());
    let src = QuestionSource::new(Some(failing.clone()), QuestionBank::default(), 3).with_seed(1);
    let out = src.generate_or_fallback(&CandidateProfile::default(), "").await;
    assert_eq!(failing.calls.load(Ordering::SeqCst), 3);
    assert_eq!(out.origin.label(), "fallback_bank");
    match &out.origin {
      QuestionOrigin::Fallback { reason } => assert!(reason.contains("unavailable")),
      other => panic!("unexpected origin {:?}", other),
    }
    let layout: Vec<Difficulty> = out.questions.iter().map(|q| q.difficulty).collect();
    assert_eq!(layout, expected_layout().to_vec());
  }

  #[tokio::test]
  async fn malformed_provider_output_falls_back() {
    let src = QuestionSource::new(Some(Arc::new(PayloadProvider("[]".into()))), QuestionBank::default(), 1);
    let out = src.generate_or_fallback(&CandidateProfile::default(), "").await;
    assert_eq!(out.origin.label(), "fallback_bank");
    assert_eq!(out.questions.len(), 6);
  }

  #[tokio::test]
  async fn disabled_provider_uses_bank() {
    let src = QuestionSource::new(None, QuestionBank::default(), 2);
    let out = src.generate_or_fallback(&CandidateProfile::default(), "").await;
    assert_eq!(out.origin, QuestionOrigin::Fallback { reason: ProviderError::Disabled.to_string() });
    assert_eq!(out.questions.len(), 6);
  }
}
