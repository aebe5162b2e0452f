//! Domain models: generated artifacts (quest, feedback, puzzle) and the quest
//! lifecycle entity owned by the store.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "EASY",
      Difficulty::Medium => "MEDIUM",
      Difficulty::Hard => "HARD",
    }
  }

  fn xp_per_step(&self) -> u32 {
    match self {
      Difficulty::Easy => 50,
      Difficulty::Medium => 100,
      Difficulty::Hard => 150,
    }
  }

  fn badge(&self) -> &'static str {
    match self {
      Difficulty::Easy => "first-steps",
      Difficulty::Medium => "problem-solver",
      Difficulty::Hard => "code-master",
    }
  }
}

impl Default for Difficulty {
  fn default() -> Self { Difficulty::Medium }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
  ArrangeCode,
  ImplementCode,
  VerifyOutput,
}

// ---------------------------------------------------------------------------
// Generated artifacts
// ---------------------------------------------------------------------------

/// A quest as produced by the model or by the fallback template.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeneratedQuest {
  pub title: String,
  pub description: String,
  pub steps: Vec<QuestStep>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestStep {
  pub title: String,
  pub description: String,
  #[serde(rename = "type")]
  pub step_type: StepType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expected_code: Option<String>,
  #[serde(default)]
  pub hints: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CodeFeedback {
  pub score: u8,
  #[serde(default)] pub feedback: String,
  #[serde(default)] pub improvements: Vec<String>,
  #[serde(default)] pub hints: Vec<String>,
  #[serde(default)] pub errors: Vec<FeedbackError>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackErrorType {
  Syntax,
  Logic,
  Style,
  Missing,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FeedbackError {
  #[serde(rename = "type")]
  pub error_type: FeedbackErrorType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line: Option<u32>,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub suggestion: Option<String>,
}

/// Hint generation only ever carries a list of hints.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HintSet {
  pub hints: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArrangementPuzzle {
  #[serde(default)] pub title: String,
  #[serde(default)] pub description: String,
  pub shuffled_blocks: Vec<CodeBlock>,
  #[serde(default)] pub hints: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
  pub id: String,
  pub code: String,
  pub correct_order: u32,
}

impl ArrangementPuzzle {
  /// True when the `correct_order` values are exactly `1..=N`.
  pub fn has_valid_ordering(&self) -> bool {
    let n = self.shuffled_blocks.len() as u32;
    let orders: BTreeSet<u32> = self.shuffled_blocks.iter().map(|b| b.correct_order).collect();
    orders.len() == self.shuffled_blocks.len() && orders.into_iter().eq(1..=n)
  }
}

// ---------------------------------------------------------------------------
// Quest lifecycle entity
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestStatus {
  Pending,
  InProgress,
  Paused,
  Completed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
  Article,
  Manual,
  Tutorial,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestSource {
  #[serde(rename = "type")]
  pub source_type: SourceType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
}

/// Reference to the learner's project. Only the fields the core reads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ProjectRef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub name: String,
  #[serde(default)]
  pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Rewards {
  pub xp: u32,
  pub badges: BTreeSet<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestProgress {
  pub completed_steps: usize,
  pub total_steps: usize,
  /// Active time in seconds.
  pub time_spent: i64,
  #[serde(default)] pub started_at: Option<DateTime<Utc>>,
  #[serde(default)] pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)] pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestStepRecord {
  pub id: String,
  pub order: usize,
  pub title: String,
  pub description: String,
  #[serde(rename = "type")]
  pub step_type: StepType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expected_code: Option<String>,
  #[serde(default)]
  pub hints: Vec<String>,
  pub is_completed: bool,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
  pub id: String,
  pub title: String,
  pub description: String,
  pub difficulty: Difficulty,
  pub status: QuestStatus,
  #[serde(default)]
  pub tags: BTreeSet<String>,
  pub progress: QuestProgress,
  pub steps: Vec<QuestStepRecord>,
  pub project: ProjectRef,
  pub source: QuestSource,
  pub rewards: Rewards,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// Bumped by the store on every successful save.
  #[serde(default)]
  pub version: u64,
}

impl Quest {
  /// Turn a generated quest into a PENDING lifecycle entity.
  pub fn from_generated(
    generated: GeneratedQuest,
    difficulty: Difficulty,
    source: QuestSource,
    project: ProjectRef,
    tags: BTreeSet<String>,
    now: DateTime<Utc>,
  ) -> Self {
    let steps: Vec<QuestStepRecord> = generated
      .steps
      .into_iter()
      .enumerate()
      .map(|(i, s)| QuestStepRecord {
        id: format!("step-{}", i + 1),
        order: i + 1,
        title: s.title,
        description: s.description,
        step_type: s.step_type,
        expected_code: s.expected_code,
        hints: s.hints,
        is_completed: false,
        completed_at: None,
      })
      .collect();

    let rewards = Rewards {
      xp: difficulty.xp_per_step() * steps.len() as u32,
      badges: BTreeSet::from([difficulty.badge().to_string()]),
    };

    Self {
      id: Uuid::new_v4().to_string(),
      title: generated.title,
      description: generated.description,
      difficulty,
      status: QuestStatus::Pending,
      tags,
      progress: QuestProgress { total_steps: steps.len(), ..Default::default() },
      steps,
      project,
      source,
      rewards,
      created_at: now,
      updated_at: now,
      version: 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn quest_step_reads_camel_case_and_screaming_type() {
    let s: QuestStep = serde_json::from_value(json!({
      "title": "t", "description": "d", "type": "IMPLEMENT_CODE",
      "expectedCode": "fn main() {}"
    }))
    .unwrap();
    assert_eq!(s.step_type, StepType::ImplementCode);
    assert_eq!(s.expected_code.as_deref(), Some("fn main() {}"));
    assert!(s.hints.is_empty());
  }

  #[test]
  fn ordering_check_detects_gaps_and_repeats() {
    let block = |o| CodeBlock { id: format!("b{o}"), code: "x".into(), correct_order: o };
    let mut p = ArrangementPuzzle {
      title: String::new(),
      description: String::new(),
      shuffled_blocks: vec![block(2), block(1), block(3)],
      hints: vec![],
    };
    assert!(p.has_valid_ordering());
    p.shuffled_blocks = vec![block(1), block(1)];
    assert!(!p.has_valid_ordering());
    p.shuffled_blocks = vec![block(1), block(3)];
    assert!(!p.has_valid_ordering());
  }

  #[test]
  fn from_generated_builds_pending_quest() {
    let g = GeneratedQuest {
      title: "T".into(),
      description: "D".into(),
      steps: vec![
        QuestStep { title: "a".into(), description: "".into(), step_type: StepType::ArrangeCode, expected_code: None, hints: vec![] },
        QuestStep { title: "b".into(), description: "".into(), step_type: StepType::VerifyOutput, expected_code: None, hints: vec![] },
      ],
    };
    let src = QuestSource { source_type: SourceType::Manual, url: None, title: None };
    let q = Quest::from_generated(g, Difficulty::Hard, src, ProjectRef::default(), BTreeSet::new(), Utc::now());
    assert_eq!(q.status, QuestStatus::Pending);
    assert_eq!(q.progress.total_steps, 2);
    assert_eq!(q.progress.completed_steps, 0);
    assert_eq!(q.steps[1].id, "step-2");
    assert_eq!(q.rewards.xp, 300);
    assert!(q.rewards.badges.contains("code-master"));
  }
}
