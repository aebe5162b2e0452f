//! Application state: the generator, the quest repository, and the sync channel.
//!
//! This module owns:
//!   - the generation orchestrator (with its injected model client)
//!   - the quest repository (in-memory unless another backend is supplied)
//!   - the `quest-updated` broadcast sender used by WebSocket connections
//!
//! Quest mutations follow load -> transition -> save(expected version) ->
//! broadcast. A concurrent writer surfaces as `QuestError::Conflict`.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::{load_agent_config_from_env, AgentConfig};
use crate::domain::{ProjectRef, Quest, QuestSource, SourceType};
use crate::error::{QuestError, ServiceError};
use crate::generation::{Generator, Origin, QuestRequest};
use crate::model::{ModelClient, UnconfiguredModel};
use crate::openai::OpenAI;
use crate::protocol::ServerWsMessage;
use crate::quest::{self, QuestStats, StepOutcome};
use crate::store::{InMemoryQuestStore, QuestRepository};

const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
  pub generator: Arc<Generator>,
  pub quests: Arc<dyn QuestRepository>,
  pub events: broadcast::Sender<ServerWsMessage>,
}

impl AppState {
  /// Build state from env: load config, build the model client, in-memory store.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let cfg = load_agent_config_from_env().unwrap_or_default();
    let AgentConfig { prompts, mut generation } = cfg;
    generation.apply_env();

    let model: Arc<dyn ModelClient> = match OpenAI::from_env(&generation) {
      Ok(oa) => {
        info!(target: "codeclimb", base_url = %oa.base_url, model = %oa.model, timeout_secs = generation.timeout_secs, "OpenAI enabled.");
        Arc::new(oa)
      }
      Err(e) => {
        info!(target: "codeclimb", reason = %e, "OpenAI disabled. Generation will serve fallbacks.");
        Arc::new(UnconfiguredModel)
      }
    };

    let generator = Generator::new(model, prompts, generation);
    Self::with_parts(generator, Arc::new(InMemoryQuestStore::new()))
  }

  pub fn with_parts(generator: Generator, quests: Arc<dyn QuestRepository>) -> Self {
    let (events, _) = broadcast::channel(EVENT_BUFFER);
    Self { generator: Arc::new(generator), quests, events }
  }

  /// Generate a quest (model or fallback) and store it as PENDING.
  #[instrument(level = "info", skip(self, req))]
  pub async fn create_quest(&self, req: &QuestRequest) -> Result<(Quest, Origin), ServiceError> {
    let generated = self.generator.generate_quest(req).await?;
    let source = QuestSource {
      source_type: SourceType::Article,
      url: Some(req.article_url.clone()),
      title: req.article_title.clone(),
    };
    let project = ProjectRef {
      id: None,
      name: req.project_context.name.clone(),
      description: req.project_context.description.clone(),
    };
    let quest = Quest::from_generated(generated.value, req.difficulty, source, project, req.tags.clone(), Utc::now());
    let saved = self.quests.save(&quest, 0).await?;
    info!(target: "quest", id = %saved.id, origin = ?generated.origin, steps = saved.steps.len(), "Quest created");
    self.publish(&saved);
    Ok((saved, generated.origin))
  }

  pub async fn get_quest(&self, id: &str) -> Result<Quest, QuestError> {
    self.quests.get(id).await?.ok_or_else(|| QuestError::NotFound(id.to_string()))
  }

  pub async fn list_quests(&self) -> Result<Vec<Quest>, QuestError> {
    Ok(self.quests.list().await?)
  }

  pub async fn delete_quest(&self, id: &str) -> Result<(), QuestError> {
    if !self.quests.delete(id).await? {
      return Err(QuestError::NotFound(id.to_string()));
    }
    info!(target: "quest", %id, "Quest deleted");
    Ok(())
  }

  /// Recomputed on every call from the full collection.
  pub async fn stats(&self) -> Result<QuestStats, QuestError> {
    let all = self.quests.list().await?;
    Ok(QuestStats::from_quests(&all))
  }

  #[instrument(level = "info", skip(self))]
  pub async fn start_quest(&self, id: &str) -> Result<Quest, QuestError> {
    let (q, _) = self.mutate(id, |q| quest::start(q, Utc::now())).await?;
    Ok(q)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn pause_quest(&self, id: &str) -> Result<Quest, QuestError> {
    let (q, _) = self.mutate(id, |q| quest::pause(q, Utc::now())).await?;
    Ok(q)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn resume_quest(&self, id: &str) -> Result<Quest, QuestError> {
    let (q, _) = self.mutate(id, |q| quest::resume(q, Utc::now())).await?;
    Ok(q)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn set_step_completion(&self, id: &str, step_id: &str, completed: bool) -> Result<(Quest, StepOutcome), QuestError> {
    let (q, outcome) = self
      .mutate(id, |q| quest::set_step_completion(q, step_id, completed, Utc::now()))
      .await?;
    if outcome == StepOutcome::Completed {
      info!(target: "quest", %id, xp = q.rewards.xp, time_spent = q.progress.time_spent, "Quest completed");
    }
    Ok((q, outcome))
  }

  /// Load, apply `op` to a working copy, and persist against the loaded version.
  /// Nothing is stored or broadcast when `op` or the save fails.
  async fn mutate<T>(
    &self,
    id: &str,
    op: impl FnOnce(&mut Quest) -> Result<T, QuestError>,
  ) -> Result<(Quest, T), QuestError> {
    let current = self.get_quest(id).await?;
    let mut working = current.clone();
    let out = op(&mut working).map_err(|e| {
      warn!(target: "quest", %id, status = ?current.status, error = %e, "Quest operation rejected");
      e
    })?;
    let saved = self.quests.save(&working, current.version).await?;
    debug!(target: "quest", %id, status = ?saved.status, completed = saved.progress.completed_steps, total = saved.progress.total_steps, "Quest updated");
    self.publish(&saved);
    Ok((saved, out))
  }

  fn publish(&self, quest: &Quest) {
    let msg = ServerWsMessage::QuestUpdated { quest: quest.clone() };
    if self.events.send(msg).is_err() {
      debug!(target: "quest", id = %quest.id, "No sync subscribers");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{GenerationSettings, Prompts};
  use crate::domain::{Difficulty, QuestStatus};
  use crate::error::{PersistenceError, ValidationError};
  use crate::generation::ProjectContext;
  use async_trait::async_trait;
  use std::collections::BTreeSet;

  fn offline_state() -> AppState {
    let gen = Generator::new(Arc::new(UnconfiguredModel), Prompts::default(), GenerationSettings::default());
    AppState::with_parts(gen, Arc::new(InMemoryQuestStore::new()))
  }

  fn request() -> QuestRequest {
    QuestRequest {
      article_url: "https://example.com/a".into(),
      implementation_goal: "build a counter".into(),
      difficulty: Difficulty::Easy,
      project_context: ProjectContext { name: "demo".into(), description: "demo app".into() },
      article_title: Some("Counters 101".into()),
      tags: BTreeSet::from(["react".to_string()]),
    }
  }

  #[tokio::test]
  async fn create_start_complete_broadcasts_each_change() {
    let state = offline_state();
    let mut rx = state.events.subscribe();

    let (q, origin) = state.create_quest(&request()).await.unwrap();
    assert_eq!(origin, Origin::Fallback);
    assert_eq!(q.status, QuestStatus::Pending);
    assert_eq!(q.source.title.as_deref(), Some("Counters 101"));
    assert!(q.title.contains("build a counter"));

    state.start_quest(&q.id).await.unwrap();
    for step in ["step-1", "step-2"] {
      state.set_step_completion(&q.id, step, true).await.unwrap();
    }
    let (done, outcome) = state.set_step_completion(&q.id, "step-3", true).await.unwrap();
    assert_eq!(outcome, StepOutcome::Completed);
    assert_eq!(done.status, QuestStatus::Completed);
    assert!(done.progress.completed_at.is_some());

    let mut seen = 0;
    while let Ok(ServerWsMessage::QuestUpdated { quest }) = rx.try_recv() {
      assert_eq!(quest.id, q.id);
      seen += 1;
    }
    assert_eq!(seen, 5);

    let stats = state.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.completion_rate, 100.0);
  }

  #[tokio::test]
  async fn illegal_transition_is_surfaced_and_nothing_is_saved() {
    let state = offline_state();
    let (q, _) = state.create_quest(&request()).await.unwrap();
    let err = state.pause_quest(&q.id).await.unwrap_err();
    assert_eq!(err, QuestError::InvalidTransition { from: QuestStatus::Pending, action: "pause" });
    assert_eq!(state.get_quest(&q.id).await.unwrap().version, q.version);
  }

  #[tokio::test]
  async fn validation_error_reaches_the_caller() {
    let state = offline_state();
    let mut req = request();
    req.implementation_goal.clear();
    let err = state.create_quest(&req).await.unwrap_err();
    assert_eq!(err, ServiceError::Validation(ValidationError::MissingField("implementationGoal")));
    assert!(state.list_quests().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_quest_is_not_found() {
    let state = offline_state();
    assert_eq!(state.start_quest("nope").await.unwrap_err(), QuestError::NotFound("nope".into()));
    assert_eq!(state.delete_quest("nope").await.unwrap_err(), QuestError::NotFound("nope".into()));
  }

  #[tokio::test]
  async fn store_outage_surfaces_as_persistence_error() {
    let store = Arc::new(crate::store::testing::FlakyStore::default());
    let gen = Generator::new(Arc::new(UnconfiguredModel), Prompts::default(), GenerationSettings::default());
    let state = AppState::with_parts(gen, store.clone());
    let (q, _) = state.create_quest(&request()).await.unwrap();
    let mut rx = state.events.subscribe();

    store.set_down(true);
    let err = state.start_quest(&q.id).await.unwrap_err();
    assert!(matches!(err, QuestError::Persistence(_)));
    assert!(matches!(state.create_quest(&request()).await, Err(ServiceError::Quest(QuestError::Persistence(_)))));
    assert!(rx.try_recv().is_err());

    store.set_down(false);
    let stored = state.get_quest(&q.id).await.unwrap();
    assert_eq!(stored.status, QuestStatus::Pending);
    assert_eq!(stored.version, q.version);
    assert_eq!(state.list_quests().await.unwrap().len(), 1);
  }

  /// Store whose writes always lose the race.
  struct RacingStore(InMemoryQuestStore);

  #[async_trait]
  impl QuestRepository for RacingStore {
    async fn get(&self, id: &str) -> Result<Option<Quest>, PersistenceError> {
      self.0.get(id).await
    }
    async fn save(&self, quest: &Quest, expected_version: u64) -> Result<Quest, PersistenceError> {
      if expected_version == 0 {
        return self.0.save(quest, 0).await;
      }
      Err(PersistenceError::Conflict { id: quest.id.clone(), expected: expected_version, found: expected_version + 1 })
    }
    async fn list(&self) -> Result<Vec<Quest>, PersistenceError> {
      self.0.list().await
    }
    async fn delete(&self, id: &str) -> Result<bool, PersistenceError> {
      self.0.delete(id).await
    }
  }

  #[tokio::test]
  async fn concurrent_write_is_reported_as_conflict() {
    let gen = Generator::new(Arc::new(UnconfiguredModel), Prompts::default(), GenerationSettings::default());
    let state = AppState::with_parts(gen, Arc::new(RacingStore(InMemoryQuestStore::new())));
    let (q, _) = state.create_quest(&request()).await.unwrap();
    let mut rx = state.events.subscribe();

    let err = state.start_quest(&q.id).await.unwrap_err();
    assert_eq!(err, QuestError::Conflict(q.id.clone()));
    assert!(rx.try_recv().is_err());
    assert_eq!(state.get_quest(&q.id).await.unwrap().status, QuestStatus::Pending);
  }
}
