//! Error types, one enum per concern.
//!
//! Generation failures (`ModelError`, `ShapeError`) never reach the caller of a
//! generation operation: they are absorbed into deterministic fallbacks.
//! Lifecycle and persistence failures are always surfaced.

use crate::domain::QuestStatus;

/// Caller-supplied input is malformed. Raised before any model call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
  #[error("missing required field: {0}")]
  MissingField(&'static str),
}

/// The external model could not produce text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
  #[error("model credential is not configured")]
  MissingCredential,

  #[error("transport error: {0}")]
  Transport(String),

  #[error("model HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("model refused: {0}")]
  Refused(String),

  #[error("model returned empty content")]
  EmptyContent,

  #[error("model call timed out after {0:?}")]
  Timeout(std::time::Duration),
}

/// The model answered but its content does not fit the expected schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
  #[error("response is not a JSON object")]
  NotAnObject,

  #[error("{kind}: missing field '{field}'")]
  MissingField { kind: &'static str, field: &'static str },

  #[error("{kind}: field '{field}' should be {expected}")]
  WrongShape { kind: &'static str, field: &'static str, expected: &'static str },

  #[error("{kind}: {message}")]
  Deserialize { kind: &'static str, message: String },

  #[error("{kind}: {message}")]
  Invariant { kind: &'static str, message: String },
}

/// Store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
  #[error("version conflict on quest {id}: expected {expected}, found {found}")]
  Conflict { id: String, expected: u64, found: u64 },

  /// Raised by durable backends; the in-memory store never fails this way.
  #[allow(dead_code)]
  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// Lifecycle failures surfaced to whoever drives a quest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestError {
  #[error("cannot {action} a quest that is {from:?}")]
  InvalidTransition { from: QuestStatus, action: &'static str },

  #[error("quest not found: {0}")]
  NotFound(String),

  #[error("step {step_id} not found in quest {quest_id}")]
  StepNotFound { quest_id: String, step_id: String },

  #[error("quest {0} was modified concurrently")]
  Conflict(String),

  #[error("persistence error: {0}")]
  Persistence(String),
}

impl From<PersistenceError> for QuestError {
  fn from(e: PersistenceError) -> Self {
    match e {
      PersistenceError::Conflict { id, .. } => QuestError::Conflict(id),
      PersistenceError::Unavailable(msg) => QuestError::Persistence(msg),
    }
  }
}

/// Anything a service-level operation can report to the HTTP/WS layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Quest(#[from] QuestError),
}

impl From<PersistenceError> for ServiceError {
  fn from(e: PersistenceError) -> Self {
    ServiceError::Quest(e.into())
  }
}
