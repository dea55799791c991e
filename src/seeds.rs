//! Built-in fallback question bank.
//!
//! Used whenever the AI provider is disabled or misbehaves. Every tier holds at least
//! `QUESTIONS_PER_TIER` entries, so drawing from it cannot fail.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::QuestionCfg;
use crate::domain::{Difficulty, InterviewQuestion, MAX_EXPECTED_KEYWORDS, QUESTIONS_PER_TIER};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankEntry {
  pub prompt: String,
  pub expected_keywords: Vec<String>,
}

impl BankEntry {
  fn new(prompt: &str, keywords: &[&str]) -> Self {
    Self {
      prompt: prompt.to_string(),
      expected_keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
  }
}

#[derive(Clone, Debug)]
pub struct QuestionBank {
  pools: HashMap<Difficulty, Vec<BankEntry>>,
}

impl Default for QuestionBank {
  fn default() -> Self {
    Self { pools: seed_pools() }
  }
}

impl QuestionBank {
  /// Seed pools plus any configured extras.
  pub fn with_extra(extra: &[QuestionCfg]) -> Self {
    let mut bank = Self::default();
    for q in extra {
      let prompt = q.prompt.trim();
      if prompt.is_empty() {
        warn!(target: "interview", difficulty = %q.difficulty, "Skipping bank item: empty prompt.");
        continue;
      }
      let mut keywords: Vec<String> = q
        .expected_keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
      keywords.truncate(MAX_EXPECTED_KEYWORDS);
      bank.pools.entry(q.difficulty).or_default().push(BankEntry {
        prompt: prompt.to_string(),
        expected_keywords: keywords,
      });
    }
    bank
  }

  pub fn pool_size(&self, difficulty: Difficulty) -> usize {
    self.pools.get(&difficulty).map(Vec::len).unwrap_or(0)
  }

  /// Six questions: two per tier, no repeats within a tier, tiers in easy/medium/hard order.
  ///
  /// Each tier is sampled with a partial Fisher-Yates shuffle over its indices.
  pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<InterviewQuestion> {
    let mut out = Vec::with_capacity(QUESTIONS_PER_TIER * Difficulty::ALL.len());
    for difficulty in Difficulty::ALL {
      let pool = self.pools.get(&difficulty).map(Vec::as_slice).unwrap_or(&[]);
      let mut indices: Vec<usize> = (0..pool.len()).collect();
      let (picked, _) = indices.partial_shuffle(rng, QUESTIONS_PER_TIER);
      for &i in picked.iter() {
        let entry = &pool[i];
        out.push(InterviewQuestion {
          id: Uuid::new_v4().to_string(),
          prompt: entry.prompt.clone(),
          difficulty,
          expected_keywords: entry.expected_keywords.clone(),
        });
      }
    }
    debug!(target: "interview", drawn = out.len(), "Drew fallback questions");
    out
  }
}

fn seed_pools() -> HashMap<Difficulty, Vec<BankEntry>> {
  HashMap::from([
    (
      Difficulty::Easy,
      vec![
        BankEntry::new(
          "Explain the difference between const, let, and var in JavaScript. When would you prefer each?",
          &["const", "let", "var", "scope", "hoisting"],
        ),
        BankEntry::new(
          "What does JSX compile down to under the hood in React?",
          &["React.createElement", "function", "component"],
        ),
        BankEntry::new(
          "How would you describe the purpose of the package.json file in a Node.js project?",
          &["dependencies", "scripts", "metadata"],
        ),
        BankEntry::new(
          "What problem does React Hooks solve compared to class components?",
          &["state", "reusability", "classes", "hooks"],
        ),
      ],
    ),
    (
      Difficulty::Medium,
      vec![
        BankEntry::new(
          "Describe how you would structure API error handling in an Express.js application that consumes a third-party service.",
          &["middleware", "try/catch", "async", "logging", "retries"],
        ),
        BankEntry::new(
          "Imagine a React list component becomes slow when rendering 1,000 items. What optimizations would you apply?",
          &["virtualization", "memoization", "key", "pagination"],
        ),
        BankEntry::new(
          "Walk through how you would secure an API route in Node.js that requires both authentication and role-based authorization.",
          &["JWT", "middleware", "roles", "permissions"],
        ),
        BankEntry::new(
          "Explain how React Query (or a similar data fetching library) helps manage server state compared to Redux.",
          &["cache", "stale", "mutations", "server state"],
        ),
      ],
    ),
    (
      Difficulty::Hard,
      vec![
        BankEntry::new(
          "Design an end-to-end logging and monitoring pipeline for a Node.js microservice deployed on Kubernetes handling spikes in traffic.",
          &["monitoring", "metrics", "kubernetes", "logging", "scaling"],
        ),
        BankEntry::new(
          "How would you architect a multi-tenant SaaS dashboard using React and Node.js to ensure data isolation and efficient querying?",
          &["multi-tenant", "isolation", "database", "sharding", "security"],
        ),
        BankEntry::new(
          "Discuss your strategy to migrate a large React codebase from JavaScript to TypeScript without halting feature development.",
          &["incremental", "tsconfig", "types", "automation"],
        ),
        BankEntry::new(
          "Outline a caching strategy for a Node.js API that serves personalized feeds with strict freshness requirements.",
          &["caching", "invalidation", "redis", "freshness", "strategy"],
        ),
      ],
    ),
  ])
}
