//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions in JSON-object mode. Calls are instrumented and log model names,
//! latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key, resume text or candidate answers.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::domain::{CandidateProfile, InterviewQuestion};
use crate::errors::ProviderError;
use crate::util::{fill_template, trunc_for_log, truncate_chars};

/// Characters of resume text included in the generation prompt.
const RESUME_SNIPPET_CHARS: usize = 2000;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

/// Score returned by the grading prompt.
#[derive(Debug, Deserialize)]
pub struct ScoreOut {
  pub score: f32,
  #[serde(default)]
  pub reasoning: String,
}

/// Summary returned by the summary prompt.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOut {
  pub overall_score: f32,
  #[serde(default)]
  pub strengths: Vec<String>,
  #[serde(default)]
  pub areas_to_improve: Vec<String>,
  #[serde(default)]
  pub final_remark: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// JSON-object chat completion returning the raw JSON text.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json_text(&self, system: &str, user: &str, temperature: f32) -> Result<String, ProviderError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "interview-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(ProviderError::Api { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();

    if text.is_empty() {
      return Err(ProviderError::EmptyContent);
    }
    debug!(target: "interview_backend", content = %trunc_for_log(&text, 400), "OpenAI content");
    Ok(text)
  }

  async fn chat_json<T: for<'a> Deserialize<'a>>(&self, system: &str, user: &str, temperature: f32) -> Result<T, ProviderError> {
    let text = self.chat_json_text(system, user, temperature).await?;
    Ok(serde_json::from_str::<T>(&text)?)
  }

  // --- High-level helpers (domain-specialized) ---

  /// Ask for six interview questions. Returns the raw JSON payload; parsing and
  /// normalisation happen in `questions`.
  #[instrument(level = "info", skip_all, fields(model = %self.model, resume_len = resume_text.len()))]
  pub async fn generate_questions(
    &self,
    prompts: &Prompts,
    profile: &CandidateProfile,
    resume_text: &str,
  ) -> Result<String, ProviderError> {
    let user = build_questions_prompt(prompts, profile, resume_text);
    let start = std::time::Instant::now();
    let result = self.chat_json_text(&prompts.questions_system, &user, 0.6).await;
    let elapsed = start.elapsed();
    match &result {
      Ok(text) => info!(?elapsed, payload_len = text.len(), "Question payload received"),
      Err(e) => error!(?elapsed, error = %e, "Model call failed during question generation"),
    }
    result
  }

  #[instrument(level = "info", skip_all, fields(question_id = %question.id, answer_len = answer.len()))]
  pub async fn score_answer(
    &self,
    prompts: &Prompts,
    question: &InterviewQuestion,
    answer: &str,
  ) -> Result<ScoreOut, ProviderError> {
    let keywords = question.expected_keywords.join(", ");
    let user = fill_template(
      &prompts.score_user_template,
      &[
        ("difficulty", question.difficulty.as_str()),
        ("question", &question.prompt),
        ("keywords", &keywords),
        ("answer", answer),
      ],
    );
    self.chat_json(&prompts.score_system, &user, 0.2).await
  }

  #[instrument(level = "info", skip_all, fields(transcript_len = transcript_json.len()))]
  pub async fn summarize(
    &self,
    prompts: &Prompts,
    name: &str,
    transcript_json: &str,
  ) -> Result<SummaryOut, ProviderError> {
    let user = fill_template(
      &prompts.summary_user_template,
      &[("name", name), ("transcript", transcript_json)],
    );
    self.chat_json(&prompts.summary_system, &user, 0.3).await
  }
}

/// User message for question generation: known profile lines, then the template with a resume snippet.
pub fn build_questions_prompt(prompts: &Prompts, profile: &CandidateProfile, resume_text: &str) -> String {
  let intro = [
    profile.name.as_deref().map(|v| format!("Candidate: {}", v)),
    profile.email.as_deref().map(|v| format!("Email: {}", v)),
    profile.phone.as_deref().map(|v| format!("Phone: {}", v)),
  ]
  .into_iter()
  .flatten()
  .collect::<Vec<_>>()
  .join("\n");

  let snippet = truncate_chars(resume_text, RESUME_SNIPPET_CHARS);
  fill_template(&prompts.questions_user_template, &[("intro", &intro), ("resume", &snippet)])
    .trim()
    .to_string()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
