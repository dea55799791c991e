//! Candidate Store: candidate id → record, last write wins.
//!
//! `MemoryStore` is the default. `JsonFileStore` keeps the same map on disk so candidates
//! (and their paused interviews) survive a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::CandidateRecord;
use crate::errors::PersistenceError;

#[async_trait]
pub trait CandidateStore: Send + Sync {
  async fn get(&self, id: &str) -> Result<Option<CandidateRecord>, PersistenceError>;
  async fn put(&self, record: CandidateRecord) -> Result<(), PersistenceError>;
  async fn list(&self) -> Result<Vec<CandidateRecord>, PersistenceError>;
}

pub type SharedStore = Arc<dyn CandidateStore>;

#[derive(Default)]
pub struct MemoryStore {
  by_id: RwLock<HashMap<String, CandidateRecord>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CandidateStore for MemoryStore {
  async fn get(&self, id: &str) -> Result<Option<CandidateRecord>, PersistenceError> {
    Ok(self.by_id.read().await.get(id).cloned())
  }

  async fn put(&self, record: CandidateRecord) -> Result<(), PersistenceError> {
    self.by_id.write().await.insert(record.id.clone(), record);
    Ok(())
  }

  async fn list(&self) -> Result<Vec<CandidateRecord>, PersistenceError> {
    Ok(self.by_id.read().await.values().cloned().collect())
  }
}

/// Whole-map JSON file. Every `put` rewrites the file through a temp file + rename.
pub struct JsonFileStore {
  path: PathBuf,
  by_id: RwLock<HashMap<String, CandidateRecord>>,
}

impl JsonFileStore {
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
    let path = path.as_ref().to_path_buf();
    let by_id = match tokio::fs::read(&path).await {
      Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
      Ok(bytes) => {
        let records: Vec<CandidateRecord> = serde_json::from_slice(&bytes)?;
        records.into_iter().map(|r| (r.id.clone(), r)).collect()
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
      Err(e) => return Err(e.into()),
    };
    info!(target: "interview_backend", candidates = by_id.len(), "Candidate store opened");
    Ok(Self { path, by_id: RwLock::new(by_id) })
  }

  async fn flush(&self, snapshot: &HashMap<String, CandidateRecord>) -> Result<(), PersistenceError> {
    let mut records: Vec<&CandidateRecord> = snapshot.values().collect();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    let bytes = serde_json::to_vec_pretty(&records)?;

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = self.path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, &self.path).await?;
    debug!(target: "interview_backend", bytes = bytes.len(), "Candidate store flushed");
    Ok(())
  }
}

#[async_trait]
impl CandidateStore for JsonFileStore {
  async fn get(&self, id: &str) -> Result<Option<CandidateRecord>, PersistenceError> {
    Ok(self.by_id.read().await.get(id).cloned())
  }

  async fn put(&self, record: CandidateRecord) -> Result<(), PersistenceError> {
    // Held across the flush so concurrent puts reach disk in order.
    let mut by_id = self.by_id.write().await;
    by_id.insert(record.id.clone(), record);
    self.flush(&by_id).await
  }

  async fn list(&self) -> Result<Vec<CandidateRecord>, PersistenceError> {
    Ok(self.by_id.read().await.values().cloned().collect())
  }
}
