//! Application state: settings, the session registry and the interview engine behind it.
//!
//! Built once at startup from env:
//!   - optional TOML agent config (prompts + extra bank questions)
//!   - optional OpenAI client; when present it backs question generation and scoring
//!   - candidate store (JSON file when STORE_PATH is set, otherwise in memory)

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_agent_config_from_env, Settings};
use crate::domain::Difficulty;
use crate::errors::PersistenceError;
use crate::interview::InterviewEngine;
use crate::openai::OpenAI;
use crate::questions::{OpenAiQuestions, QuestionProvider, QuestionSource};
use crate::scoring::{LlmScorer, Scoring};
use crate::seeds::QuestionBank;
use crate::session::SessionCoordinator;
use crate::store::{JsonFileStore, MemoryStore, SharedStore};
use crate::timer::{SharedClock, SystemClock};

pub struct AppState {
  pub settings: Settings,
  pub sessions: SessionCoordinator,
}

impl AppState {
  #[instrument(level = "info", skip_all)]
  pub async fn from_env(settings: Settings) -> Result<Self, PersistenceError> {
    let cfg = load_agent_config_from_env();
    let prompts = cfg.as_ref().map(|c| c.prompts.clone()).unwrap_or_default();
    let bank = cfg
      .as_ref()
      .map(|c| QuestionBank::with_extra(&c.questions))
      .unwrap_or_default();

    let openai = OpenAI::from_env();
    let provider = openai.clone().map(|client| {
      Arc::new(OpenAiQuestions { client, prompts: prompts.clone() }) as Arc<dyn QuestionProvider>
    });
    let scoring = match openai {
      Some(client) => Scoring::new(Arc::new(LlmScorer { client, prompts })),
      None => Scoring::default(),
    };

    let store: SharedStore = match &settings.store_path {
      Some(path) => Arc::new(JsonFileStore::open(path).await?),
      None => Arc::new(MemoryStore::new()),
    };

    let questions = QuestionSource::new(provider, bank, settings.question_attempts);
    let state = Self::assemble(settings, store, questions, scoring, Arc::new(SystemClock));

    let engine = state.sessions.engine();
    let bank = engine.question_source().bank();
    info!(
      target: "interview_backend",
      provider = engine.question_source().provider_name().unwrap_or("none"),
      scorer = engine.scoring().primary_name(),
      durable_store = state.settings.store_path.is_some(),
      bank_easy = bank.pool_size(Difficulty::Easy),
      bank_medium = bank.pool_size(Difficulty::Medium),
      bank_hard = bank.pool_size(Difficulty::Hard),
      "Application state initialized"
    );
    Ok(state)
  }

  pub fn assemble(
    settings: Settings,
    store: SharedStore,
    questions: QuestionSource,
    scoring: Scoring,
    clock: SharedClock,
  ) -> Self {
    let engine = Arc::new(InterviewEngine::new(store.clone(), questions, scoring, clock));
    Self { settings, sessions: SessionCoordinator::new(engine, store) }
  }

  pub fn engine(&self) -> &InterviewEngine {
    self.sessions.engine()
  }

  pub fn store(&self) -> &SharedStore {
    self.sessions.store()
  }
}
