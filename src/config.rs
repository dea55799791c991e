//! Runtime settings (env) and agent configuration (prompts + optional extra bank questions) from TOML.
//!
//! See `AgentConfig` and `Prompts` for the TOML schema and `Settings` for env variables.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::Difficulty;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TICK_MS: u64 = 500;
const MIN_TICK_MS: u64 = 250;
const MAX_TICK_MS: u64 = 500;
const DEFAULT_QUESTION_ATTEMPTS: u32 = 2;
const DEFAULT_SESSION_IDLE_MS: u64 = 60_000;
const MIN_SESSION_IDLE_MS: u64 = 5_000;

/// Process settings read from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  /// JSON file for durable candidate records; `None` keeps them in memory only.
  pub store_path: Option<PathBuf>,
  pub tick_interval_ms: u64,
  /// Primary-path attempts before the fallback bank is used.
  pub question_attempts: u32,
  /// A session with no open socket and no request for this long is paused and dropped.
  pub session_idle_ms: u64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      port: DEFAULT_PORT,
      store_path: None,
      tick_interval_ms: DEFAULT_TICK_MS,
      question_attempts: DEFAULT_QUESTION_ATTEMPTS,
      session_idle_ms: DEFAULT_SESSION_IDLE_MS,
    }
  }
}

impl Settings {
  pub fn from_env() -> Self {
    Self::from_lookup(|k| std::env::var(k).ok())
  }

  fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
    let port = get("PORT")
      .and_then(|p| p.parse::<u16>().ok())
      .unwrap_or(DEFAULT_PORT);

    let store_path = get("STORE_PATH")
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .map(PathBuf::from);

    let tick_interval_ms = match get("TICK_INTERVAL_MS").map(|s| s.parse::<u64>()) {
      Some(Ok(ms)) => {
        let clamped = ms.clamp(MIN_TICK_MS, MAX_TICK_MS);
        if clamped != ms {
          warn!(target: "interview_backend", requested = ms, used = clamped, "TICK_INTERVAL_MS out of range; clamped");
        }
        clamped
      }
      Some(Err(e)) => {
        warn!(target: "interview_backend", error = %e, "Invalid TICK_INTERVAL_MS; using default");
        DEFAULT_TICK_MS
      }
      None => DEFAULT_TICK_MS,
    };

    let question_attempts = get("QUESTION_ATTEMPTS")
      .and_then(|s| s.parse::<u32>().ok())
      .unwrap_or(DEFAULT_QUESTION_ATTEMPTS)
      .max(1);

    let session_idle_ms = get("SESSION_IDLE_MS")
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_SESSION_IDLE_MS)
      .max(MIN_SESSION_IDLE_MS);

    Self { port, store_path, tick_interval_ms, question_attempts, session_idle_ms }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub questions: Vec<QuestionCfg>,
}

/// Extra fallback-bank entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub difficulty: Difficulty,
  pub prompt: String,
  #[serde(default, rename = "expected_keywords")]
  pub expected_keywords: Vec<String>,
}

/// Prompts used by the OpenAI client. Defaults target React/Node full-stack interviews.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Question generation
  pub questions_system: String,
  pub questions_user_template: String,
  // Per-answer scoring
  pub score_system: String,
  pub score_user_template: String,
  // Final summary
  pub summary_system: String,
  pub summary_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      questions_system: "You are an interviewer focusing on React and Node.js full stack skills. Generate concise, technical interview questions. Respond ONLY with strict JSON.".into(),
      questions_user_template: "{intro}\n\nYou are preparing a timed technical interview for a full-stack React/Node developer.\nResume snippet:\n\"\"\"\n{resume}\n\"\"\"\n\nReturn a JSON object with a \"questions\" array containing exactly 6 items ordered by difficulty: two easy, two medium, two hard.\nEach item must be an object with keys: \"prompt\" (string question), \"difficulty\" (easy|medium|hard) and \"expectedKeywords\" (array of 3-5 keywords).\nThe questions must be concise and grounded in React, Node.js, TypeScript, system design, or web performance.".into(),
      score_system: "You are a strict but fair technical interviewer grading a timed answer. Output JSON only.".into(),
      score_user_template: "Question ({difficulty}): {question}\nExpected keywords: {keywords}\nCandidate answer: {answer}\n\nReturn JSON {\"score\": number, \"reasoning\": string}. Score 0-100. An empty answer scores 0.".into(),
      summary_system: "You summarise technical interviews for a hiring panel. Be concise. Output JSON only.".into(),
      summary_user_template: "Candidate: {name}\nQuestion/answer log (JSON): {transcript}\n\nReturn JSON {\"overallScore\": number, \"strengths\": [string], \"areasToImprove\": [string], \"finalRemark\": string}. overallScore is 0-100.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "interview_backend", %path, extra_questions = cfg.questions.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "interview_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "interview_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
