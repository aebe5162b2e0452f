//! Generation orchestrator: quest, code feedback, hints, and arrangement puzzles.
//!
//! Every kind follows the same path:
//!   validate input -> build variables -> interpolate prompts -> invoke model
//!   (bounded by a timeout) -> parse -> shape-check -> value
//! and any failure after input validation collapses into that kind's
//! deterministic fallback. Only `ValidationError` reaches the caller.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::config::{GenerationSettings, KindParams, Prompts};
use crate::domain::{ArrangementPuzzle, CodeFeedback, Difficulty, GeneratedQuest, HintSet};
use crate::error::{ModelError, ShapeError, ValidationError};
use crate::model::ModelClient;
use crate::seeds::{fallback_arrangement, fallback_feedback, fallback_hints, fallback_quest};
use crate::util::{interpolate, trunc_for_log, Variables};
use crate::validator::{parse_model_response, Validated};

// --- Requests ---

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectContext {
  #[serde(default)] pub name: String,
  #[serde(default)] pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestRequest {
  #[serde(default)] pub article_url: String,
  #[serde(default)] pub implementation_goal: String,
  #[serde(default)] pub difficulty: Difficulty,
  #[serde(default)] pub project_context: ProjectContext,
  #[serde(default)] pub article_title: Option<String>,
  #[serde(default)] pub tags: BTreeSet<String>,
}

impl QuestRequest {
  pub fn validate(&self) -> Result<(), ValidationError> {
    require("articleUrl", &self.article_url)?;
    require("implementationGoal", &self.implementation_goal)
  }

  pub fn variables(&self) -> Variables {
    vars(json!({
      "articleUrl": self.article_url,
      "implementationGoal": self.implementation_goal,
      "difficulty": self.difficulty.as_str(),
      "projectName": self.project_context.name,
      "projectDescription": self.project_context.description,
    }))
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
  #[serde(default)] pub submitted_code: String,
  #[serde(default)] pub expected_code: String,
  #[serde(default)] pub file_path: String,
}

impl FeedbackRequest {
  pub fn validate(&self) -> Result<(), ValidationError> {
    require("submittedCode", &self.submitted_code)
  }

  pub fn variables(&self) -> Variables {
    vars(json!({
      "submittedCode": self.submitted_code,
      "expectedCode": self.expected_code,
      "filePath": self.file_path,
    }))
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRequest {
  #[serde(default)] pub current_code: String,
  #[serde(default)] pub error_message: String,
  #[serde(default)] pub step_goal: String,
  #[serde(default)] pub difficulty: Difficulty,
}

impl HintRequest {
  pub fn validate(&self) -> Result<(), ValidationError> {
    require("stepGoal", &self.step_goal)
  }

  pub fn variables(&self) -> Variables {
    vars(json!({
      "currentCode": self.current_code,
      "errorMessage": self.error_message,
      "stepGoal": self.step_goal,
      "difficulty": self.difficulty.as_str(),
    }))
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangementRequest {
  #[serde(default)] pub original_code: String,
  #[serde(default)] pub learning_goal: String,
}

impl ArrangementRequest {
  pub fn validate(&self) -> Result<(), ValidationError> {
    require("originalCode", &self.original_code)
  }

  pub fn variables(&self) -> Variables {
    vars(json!({
      "originalCode": self.original_code,
      "learningGoal": self.learning_goal,
    }))
  }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    return Err(ValidationError::MissingField(field));
  }
  Ok(())
}

fn vars(v: serde_json::Value) -> Variables {
  match v {
    serde_json::Value::Object(map) => map,
    _ => Variables::new(),
  }
}

// --- Results ---

/// Which path produced a generated value. Advisory only.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
  Model,
  Fallback,
}

#[derive(Clone, Debug, Serialize)]
pub struct Generated<T> {
  pub value: T,
  pub origin: Origin,
}

#[derive(Debug, thiserror::Error)]
enum FallbackReason {
  #[error(transparent)]
  Model(#[from] ModelError),
  #[error(transparent)]
  Shape(#[from] ShapeError),
}

// --- Orchestrator ---

pub struct Generator {
  model: Arc<dyn ModelClient>,
  prompts: Prompts,
  settings: GenerationSettings,
  timeout: Duration,
}

impl Generator {
  pub fn new(model: Arc<dyn ModelClient>, prompts: Prompts, settings: GenerationSettings) -> Self {
    let timeout = settings.timeout();
    Self { model, prompts, settings, timeout }
  }

  /// Override the model-call bound.
  #[cfg(test)]
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  #[instrument(level = "info", skip(self, req), fields(difficulty = req.difficulty.as_str(), goal = %trunc_for_log(&req.implementation_goal, 40)))]
  pub async fn generate_quest(&self, req: &QuestRequest) -> Result<Generated<GeneratedQuest>, ValidationError> {
    req.validate()?;
    let vars = req.variables();
    let out = self
      .generate(
        "quest",
        &self.prompts.quest_system,
        &self.prompts.quest_user_template,
        &vars,
        self.settings.quest,
        || fallback_quest(&vars),
      )
      .await;
    Ok(out)
  }

  #[instrument(level = "info", skip(self, req), fields(file_path = %req.file_path, code_len = req.submitted_code.len()))]
  pub async fn generate_feedback(&self, req: &FeedbackRequest) -> Result<Generated<CodeFeedback>, ValidationError> {
    req.validate()?;
    let vars = req.variables();
    let out = self
      .generate(
        "feedback",
        &self.prompts.feedback_system,
        &self.prompts.feedback_user_template,
        &vars,
        self.settings.feedback,
        fallback_feedback,
      )
      .await;
    Ok(out)
  }

  #[instrument(level = "info", skip(self, req), fields(difficulty = req.difficulty.as_str(), has_error = !req.error_message.is_empty()))]
  pub async fn generate_hints(&self, req: &HintRequest) -> Result<Generated<HintSet>, ValidationError> {
    req.validate()?;
    let vars = req.variables();
    let out = self
      .generate(
        "hints",
        &self.prompts.hint_system,
        &self.prompts.hint_user_template,
        &vars,
        self.settings.hint,
        || HintSet { hints: fallback_hints() },
      )
      .await;
    Ok(out)
  }

  #[instrument(level = "info", skip(self, req), fields(code_len = req.original_code.len()))]
  pub async fn generate_arrangement(&self, req: &ArrangementRequest) -> Result<Generated<ArrangementPuzzle>, ValidationError> {
    req.validate()?;
    let vars = req.variables();
    let out = self
      .generate(
        "arrangement",
        &self.prompts.arrangement_system,
        &self.prompts.arrangement_user_template,
        &vars,
        self.settings.arrangement,
        || fallback_arrangement(&req.original_code, &req.learning_goal),
      )
      .await;
    Ok(out)
  }

  async fn generate<T: Validated>(
    &self,
    kind: &'static str,
    system_tpl: &str,
    user_tpl: &str,
    vars: &Variables,
    params: KindParams,
    fallback: impl FnOnce() -> T,
  ) -> Generated<T> {
    let system = interpolate(system_tpl, vars);
    let user = interpolate(user_tpl, vars);

    let start = Instant::now();
    let result = self.attempt::<T>(&system, &user, params).await;
    let elapsed = start.elapsed();

    match result {
      Ok(value) => {
        info!(target: "generation", kind, ?elapsed, origin = "model", "Model response accepted");
        Generated { value, origin: Origin::Model }
      }
      Err(reason) => {
        warn!(target: "generation", kind, ?elapsed, origin = "fallback", error = %reason, "Serving fallback");
        Generated { value: fallback(), origin: Origin::Fallback }
      }
    }
  }

  async fn attempt<T: Validated>(&self, system: &str, user: &str, params: KindParams) -> Result<T, FallbackReason> {
    let raw = tokio::time::timeout(self.timeout, self.model.invoke(system, user, params))
      .await
      .map_err(|_| ModelError::Timeout(self.timeout))??;
    let parsed = parse_model_response(&raw).ok_or(ShapeError::NotAnObject)?;
    Ok(T::from_map(&parsed)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::StepType;
  use crate::model::MockModelClient;
  use async_trait::async_trait;

  fn generator(mock: MockModelClient) -> Generator {
    Generator::new(Arc::new(mock), Prompts::default(), GenerationSettings::default())
  }

  fn counter_request() -> QuestRequest {
    QuestRequest {
      article_url: "https://example.com/a".into(),
      implementation_goal: "build a counter".into(),
      difficulty: Difficulty::Easy,
      project_context: ProjectContext { name: "demo".into(), description: "demo app".into() },
      article_title: None,
      tags: BTreeSet::new(),
    }
  }

  #[tokio::test]
  async fn transport_error_yields_interpolated_fallback_quest() {
    let mut mock = MockModelClient::new();
    mock
      .expect_invoke()
      .times(1)
      .returning(|_, _, _| Err(ModelError::Transport("connection refused".into())));

    let out = generator(mock).generate_quest(&counter_request()).await.unwrap();
    assert_eq!(out.origin, Origin::Fallback);
    assert!(out.value.title.contains("build a counter"));
    assert_eq!(out.value.steps.len(), 3);
    let types: Vec<StepType> = out.value.steps.iter().map(|s| s.step_type).collect();
    assert_eq!(types, vec![StepType::ArrangeCode, StepType::ImplementCode, StepType::VerifyOutput]);
  }

  #[tokio::test]
  async fn prompts_are_interpolated_with_request_fields() {
    let mut mock = MockModelClient::new();
    mock
      .expect_invoke()
      .withf(|_system, user, params| {
        user.contains("Goal: build a counter")
          && user.contains("Project: demo (demo app)")
          && params.temperature == 0.7
      })
      .times(1)
      .returning(|_, _, _| {
        Ok(r#"```json
{"title": "Counter quest", "description": "d", "steps": [{"title": "s", "description": "x", "type": "IMPLEMENT_CODE", "expectedCode": "let n = 0;"}]}
```"#
          .to_string())
      });

    let out = generator(mock).generate_quest(&counter_request()).await.unwrap();
    assert_eq!(out.origin, Origin::Model);
    assert_eq!(out.value.title, "Counter quest");
    assert_eq!(out.value.steps.len(), 1);
  }

  #[tokio::test]
  async fn missing_article_url_is_rejected_before_model_call() {
    let mut mock = MockModelClient::new();
    mock.expect_invoke().never();

    let mut req = counter_request();
    req.article_url = "   ".into();
    let err = generator(mock).generate_quest(&req).await.unwrap_err();
    assert_eq!(err, ValidationError::MissingField("articleUrl"));
  }

  #[tokio::test]
  async fn malformed_quest_falls_back() {
    let mut mock = MockModelClient::new();
    mock
      .expect_invoke()
      .returning(|_, _, _| Ok(r#"{"title": "x", "description": "y", "steps": []}"#.to_string()));

    let out = generator(mock).generate_quest(&counter_request()).await.unwrap();
    assert_eq!(out.origin, Origin::Fallback);
    assert_eq!(out.value.steps.len(), 3);
  }

  #[tokio::test]
  async fn feedback_uses_cool_temperature_and_falls_back_to_fifty() {
    let mut mock = MockModelClient::new();
    mock
      .expect_invoke()
      .withf(|_, _, params| params.temperature < 0.5)
      .returning(|_, _, _| Ok("not json at all".to_string()));

    let req = FeedbackRequest {
      submitted_code: "fn add(a: i32, b: i32) -> i32 { a - b }".into(),
      expected_code: "fn add(a: i32, b: i32) -> i32 { a + b }".into(),
      file_path: "src/lib.rs".into(),
    };
    let out = generator(mock).generate_feedback(&req).await.unwrap();
    assert_eq!(out.origin, Origin::Fallback);
    assert_eq!(out.value.score, 50);
    assert_eq!(out.value.improvements.len(), 3);
    assert!(out.value.errors.is_empty());
  }

  #[tokio::test]
  async fn feedback_from_model_is_returned_as_is() {
    let mut mock = MockModelClient::new();
    mock.expect_invoke().returning(|_, _, _| {
      Ok(r#"{"score": 85, "feedback": "Nice", "improvements": [], "hints": [],
             "errors": [{"type": "logic", "line": 1, "message": "wrong operator", "suggestion": "use +"}]}"#
        .to_string())
    });

    let req = FeedbackRequest { submitted_code: "a - b".into(), expected_code: "a + b".into(), file_path: String::new() };
    let out = generator(mock).generate_feedback(&req).await.unwrap();
    assert_eq!(out.origin, Origin::Model);
    assert_eq!(out.value.score, 85);
    assert_eq!(out.value.errors[0].line, Some(1));
  }

  #[tokio::test]
  async fn empty_content_falls_back_to_fixed_hints() {
    let mut mock = MockModelClient::new();
    mock.expect_invoke().returning(|_, _, _| Err(ModelError::EmptyContent));

    let req = HintRequest {
      current_code: "let x = ;".into(),
      error_message: "expected expression".into(),
      step_goal: "declare a variable".into(),
      difficulty: Difficulty::Easy,
    };
    let out = generator(mock).generate_hints(&req).await.unwrap();
    assert_eq!(out.origin, Origin::Fallback);
    assert_eq!(out.value.hints, fallback_hints());
  }

  #[tokio::test]
  async fn arrangement_fallback_keeps_line_order() {
    let mut mock = MockModelClient::new();
    mock.expect_invoke().returning(|_, _, _| Err(ModelError::MissingCredential));

    let req = ArrangementRequest { original_code: "a\n\nb\nc".into(), learning_goal: "ordering".into() };
    let out = generator(mock).generate_arrangement(&req).await.unwrap();
    assert_eq!(out.origin, Origin::Fallback);
    let codes: Vec<&str> = out.value.shuffled_blocks.iter().map(|b| b.code.as_str()).collect();
    assert_eq!(codes, vec!["a", "b", "c"]);
    assert!(out.value.has_valid_ordering());
  }

  struct SlowModel;

  #[async_trait]
  impl ModelClient for SlowModel {
    async fn invoke(&self, _system: &str, _user: &str, _params: KindParams) -> Result<String, ModelError> {
      tokio::time::sleep(Duration::from_secs(5)).await;
      Ok(r#"{"hints": ["too late"]}"#.to_string())
    }
  }

  #[tokio::test]
  async fn slow_model_times_out_into_fallback() {
    let gen = Generator::new(Arc::new(SlowModel), Prompts::default(), GenerationSettings::default())
      .with_timeout(Duration::from_millis(20));
    let req = HintRequest {
      current_code: String::new(),
      error_message: String::new(),
      step_goal: "loop over items".into(),
      difficulty: Difficulty::Medium,
    };
    let out = gen.generate_hints(&req).await.unwrap();
    assert_eq!(out.origin, Origin::Fallback);
    assert_eq!(out.value.hints.len(), 3);
  }
}
