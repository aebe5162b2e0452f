//! Model-response parsing and declarative shape validation.
//!
//! Flow:
//! 1) `parse_model_response` strips code fences and parses a JSON object.
//! 2) `validate` checks the object against a `Schema` (required fields and
//!    their shapes), then deserializes it into the typed value.
//! 3) Kind-specific invariants are checked on the typed value.
//!
//! None of these steps raise to the caller of a generation operation: the
//! orchestrator turns every `None`/`ShapeError` into a fallback.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::{ArrangementPuzzle, CodeFeedback, GeneratedQuest, HintSet};
use crate::error::ShapeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
  String,
  Number,
  NonEmptyArray,
}

impl Shape {
  fn matches(&self, v: &Value) -> bool {
    match self {
      Shape::String => v.is_string(),
      Shape::Number => v.is_number(),
      Shape::NonEmptyArray => v.as_array().map(|a| !a.is_empty()).unwrap_or(false),
    }
  }

  fn describe(&self) -> &'static str {
    match self {
      Shape::String => "a string",
      Shape::Number => "a number",
      Shape::NonEmptyArray => "a non-empty array",
    }
  }
}

/// Declarative descriptor: which top-level fields must exist, and their shapes.
#[derive(Debug)]
pub struct Schema {
  pub kind: &'static str,
  pub fields: &'static [(&'static str, Shape)],
}

pub const QUEST_SCHEMA: Schema = Schema {
  kind: "quest",
  fields: &[("title", Shape::String), ("description", Shape::String), ("steps", Shape::NonEmptyArray)],
};

pub const FEEDBACK_SCHEMA: Schema = Schema {
  kind: "feedback",
  fields: &[("score", Shape::Number)],
};

pub const HINTS_SCHEMA: Schema = Schema {
  kind: "hints",
  fields: &[("hints", Shape::NonEmptyArray)],
};

pub const ARRANGEMENT_SCHEMA: Schema = Schema {
  kind: "arrangement",
  fields: &[("shuffledBlocks", Shape::NonEmptyArray)],
};

/// Strip fence markers around a JSON blob and parse it.
/// The opening fence may carry a language tag in any case (json, JSON, Json).
/// Returns `None` when the text is not JSON or its top level is not an object.
pub fn parse_model_response(raw: &str) -> Option<Map<String, Value>> {
  let mut text = raw.trim();
  if let Some(rest) = text.strip_prefix("```") {
    text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
  }
  if let Some(rest) = text.strip_suffix("```") {
    text = rest;
  }
  match serde_json::from_str::<Value>(text.trim()) {
    Ok(Value::Object(map)) => Some(map),
    _ => None,
  }
}

/// Check `parsed` against `schema`, then deserialize it into `T`.
pub fn validate<T: DeserializeOwned>(parsed: &Map<String, Value>, schema: &Schema) -> Result<T, ShapeError> {
  for &(field, shape) in schema.fields {
    let v = parsed
      .get(field)
      .ok_or(ShapeError::MissingField { kind: schema.kind, field })?;
    if !shape.matches(v) {
      return Err(ShapeError::WrongShape { kind: schema.kind, field, expected: shape.describe() });
    }
  }
  serde_json::from_value(Value::Object(parsed.clone()))
    .map_err(|e| ShapeError::Deserialize { kind: schema.kind, message: e.to_string() })
}

/// Kinds of model output with their descriptor and post-deserialization invariants.
pub trait Validated: DeserializeOwned + Sized {
  const SCHEMA: &'static Schema;

  fn check(&self) -> Result<(), ShapeError> {
    Ok(())
  }

  fn from_map(parsed: &Map<String, Value>) -> Result<Self, ShapeError> {
    let v: Self = validate(parsed, Self::SCHEMA)?;
    v.check()?;
    Ok(v)
  }
}

impl Validated for GeneratedQuest {
  const SCHEMA: &'static Schema = &QUEST_SCHEMA;
}

impl Validated for CodeFeedback {
  const SCHEMA: &'static Schema = &FEEDBACK_SCHEMA;

  fn check(&self) -> Result<(), ShapeError> {
    if self.score > 100 {
      return Err(ShapeError::Invariant { kind: "feedback", message: format!("score {} out of range", self.score) });
    }
    Ok(())
  }
}

impl Validated for HintSet {
  const SCHEMA: &'static Schema = &HINTS_SCHEMA;
}

impl Validated for ArrangementPuzzle {
  const SCHEMA: &'static Schema = &ARRANGEMENT_SCHEMA;

  fn check(&self) -> Result<(), ShapeError> {
    if !self.has_valid_ordering() {
      return Err(ShapeError::Invariant {
        kind: "arrangement",
        message: "correctOrder values must be a permutation of 1..N".into(),
      });
    }
    Ok(())
  }
}
