//! Quest lifecycle: status transitions, step completion, time tracking and
//! aggregate statistics.
//!
//!   PENDING --start--> IN_PROGRESS --pause--> PAUSED --resume--> IN_PROGRESS
//!   any non-paused state --(all steps complete)--> COMPLETED
//!
//! Every operation takes the current time explicitly and returns a `Result`;
//! an illegal transition is an error, never a silent no-op. Progress counters
//! are always recomputed from the steps, so they cannot drift.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Quest, QuestStatus};
use crate::error::QuestError;

/// What a step toggle did to the quest as a whole.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
  /// Progress changed; status did not.
  Updated,
  /// The last open step was completed; the quest is now COMPLETED.
  Completed,
  /// A step of a COMPLETED quest was reopened; the quest is IN_PROGRESS again.
  Reopened,
}

pub fn start(quest: &mut Quest, now: DateTime<Utc>) -> Result<(), QuestError> {
  expect_status(quest, QuestStatus::Pending, "start")?;
  quest.status = QuestStatus::InProgress;
  quest.progress.started_at = Some(now);
  quest.progress.last_activity_at = Some(now);
  quest.updated_at = now;
  Ok(())
}

pub fn pause(quest: &mut Quest, now: DateTime<Utc>) -> Result<(), QuestError> {
  expect_status(quest, QuestStatus::InProgress, "pause")?;
  accrue_active_time(quest, now);
  quest.status = QuestStatus::Paused;
  quest.updated_at = now;
  Ok(())
}

pub fn resume(quest: &mut Quest, now: DateTime<Utc>) -> Result<(), QuestError> {
  expect_status(quest, QuestStatus::Paused, "resume")?;
  quest.status = QuestStatus::InProgress;
  quest.progress.last_activity_at = Some(now);
  quest.updated_at = now;
  Ok(())
}

/// Mark a step complete or incomplete.
///
/// Rejected while PAUSED. Applying the same `(step_id, completed)` twice
/// leaves progress, status and the step's `completed_at` unchanged.
pub fn set_step_completion(
  quest: &mut Quest,
  step_id: &str,
  completed: bool,
  now: DateTime<Utc>,
) -> Result<StepOutcome, QuestError> {
  if quest.status == QuestStatus::Paused {
    return Err(QuestError::InvalidTransition { from: QuestStatus::Paused, action: "complete a step of" });
  }

  let step = quest
    .steps
    .iter_mut()
    .find(|s| s.id == step_id)
    .ok_or_else(|| QuestError::StepNotFound { quest_id: quest.id.clone(), step_id: step_id.to_string() })?;

  step.is_completed = completed;
  if completed {
    if step.completed_at.is_none() {
      step.completed_at = Some(now);
    }
  } else {
    step.completed_at = None;
  }

  accrue_active_time(quest, now);
  recompute_progress(quest);
  quest.progress.last_activity_at = Some(now);
  quest.updated_at = now;

  let all_done = quest.progress.completed_steps == quest.progress.total_steps;
  let outcome = match (quest.status, all_done) {
    (QuestStatus::Completed, true) => StepOutcome::Updated,
    (_, true) => {
      quest.status = QuestStatus::Completed;
      quest.progress.completed_at = Some(now);
      StepOutcome::Completed
    }
    (QuestStatus::Completed, false) => {
      // Completed without ever being started: back to PENDING so `start` still stamps `started_at`.
      quest.status = if quest.progress.started_at.is_some() { QuestStatus::InProgress } else { QuestStatus::Pending };
      quest.progress.completed_at = None;
      StepOutcome::Reopened
    }
    _ => StepOutcome::Updated,
  };
  Ok(outcome)
}

/// Derive `completed_steps`/`total_steps` from the steps themselves.
pub fn recompute_progress(quest: &mut Quest) {
  quest.progress.total_steps = quest.steps.len();
  quest.progress.completed_steps = quest.steps.iter().filter(|s| s.is_completed).count();
}

fn expect_status(quest: &Quest, expected: QuestStatus, action: &'static str) -> Result<(), QuestError> {
  if quest.status != expected {
    return Err(QuestError::InvalidTransition { from: quest.status, action });
  }
  Ok(())
}

/// Add the time since the last activity to `time_spent`, only while active.
fn accrue_active_time(quest: &mut Quest, now: DateTime<Utc>) {
  if quest.status != QuestStatus::InProgress {
    return;
  }
  if let Some(last) = quest.progress.last_activity_at {
    let secs = (now - last).num_seconds();
    if secs > 0 {
      quest.progress.time_spent += secs;
    }
  }
  quest.progress.last_activity_at = Some(now);
}

/// Aggregate statistics over a quest collection. Always computed fresh.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestStats {
  pub total: usize,
  pub pending: usize,
  pub in_progress: usize,
  pub paused: usize,
  pub completed: usize,
  pub total_time_spent: i64,
  pub average_completion_time: f64,
  pub completion_rate: f64,
}

impl QuestStats {
  pub fn from_quests(quests: &[Quest]) -> Self {
    let mut stats = QuestStats { total: quests.len(), ..Default::default() };
    let mut completed_time: i64 = 0;

    for q in quests {
      stats.total_time_spent += q.progress.time_spent;
      match q.status {
        QuestStatus::Pending => stats.pending += 1,
        QuestStatus::InProgress => stats.in_progress += 1,
        QuestStatus::Paused => stats.paused += 1,
        QuestStatus::Completed => {
          stats.completed += 1;
          completed_time += q.progress.time_spent;
        }
      }
    }

    if stats.completed > 0 {
      stats.average_completion_time = completed_time as f64 / stats.completed as f64;
    }
    if stats.total > 0 {
      stats.completion_rate = stats.completed as f64 / stats.total as f64 * 100.0;
    }
    stats
  }
}
