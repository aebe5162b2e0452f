//! Quest persistence boundary.
//!
//! The lifecycle logic only sees `QuestRepository`; the in-memory store is the
//! default backend and the one used in tests. Saves are optimistic: the caller
//! passes the version it loaded and a mismatch is reported as a conflict
//! rather than overwritten.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::Quest;
use crate::error::PersistenceError;

#[async_trait]
pub trait QuestRepository: Send + Sync {
  async fn get(&self, id: &str) -> Result<Option<Quest>, PersistenceError>;

  /// Persist `quest` if the stored version still equals `expected_version`
  /// (0 for a new quest). Returns the stored copy with its bumped version.
  async fn save(&self, quest: &Quest, expected_version: u64) -> Result<Quest, PersistenceError>;

  async fn list(&self) -> Result<Vec<Quest>, PersistenceError>;

  /// Returns true when a quest was removed.
  async fn delete(&self, id: &str) -> Result<bool, PersistenceError>;
}

#[derive(Clone, Default)]
pub struct InMemoryQuestStore {
  by_id: Arc<RwLock<HashMap<String, Quest>>>,
}

impl InMemoryQuestStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl QuestRepository for InMemoryQuestStore {
  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn get(&self, id: &str) -> Result<Option<Quest>, PersistenceError> {
    Ok(self.by_id.read().await.get(id).cloned())
  }

  #[instrument(level = "debug", skip(self, quest), fields(id = %quest.id))]
  async fn save(&self, quest: &Quest, expected_version: u64) -> Result<Quest, PersistenceError> {
    let mut by_id = self.by_id.write().await;
    let found = by_id.get(&quest.id).map(|q| q.version).unwrap_or(0);
    if found != expected_version {
      return Err(PersistenceError::Conflict { id: quest.id.clone(), expected: expected_version, found });
    }
    let mut stored = quest.clone();
    stored.version = found + 1;
    by_id.insert(stored.id.clone(), stored.clone());
    debug!(version = stored.version, "Quest saved");
    Ok(stored)
  }

  async fn list(&self) -> Result<Vec<Quest>, PersistenceError> {
    let mut all: Vec<Quest> = self.by_id.read().await.values().cloned().collect();
    all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(all)
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  async fn delete(&self, id: &str) -> Result<bool, PersistenceError> {
    Ok(self.by_id.write().await.remove(id).is_some())
  }
}
