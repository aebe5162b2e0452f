//! Minimal OpenAI-compatible client implementing `ModelClient`.
//!
//! We only call chat.completions and request a strict JSON object.
//! Calls are instrumented and log model name, latency, and response size (not contents).
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{GenerationSettings, KindParams};
use crate::error::ModelError;
use crate::model::ModelClient;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Build a client from an explicit key and the generation settings.
  /// The HTTP client timeout sits slightly above the orchestrator's own bound.
  pub fn new(api_key: String, settings: &GenerationSettings) -> Result<Self, ModelError> {
    if api_key.trim().is_empty() {
      return Err(ModelError::MissingCredential);
    }
    let client = reqwest::Client::builder()
      .timeout(settings.timeout() + Duration::from_secs(2))
      .build()
      .map_err(|e| ModelError::Transport(e.to_string()))?;

    Ok(Self {
      client,
      api_key,
      base_url: settings.base_url.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
    })
  }

  /// Construct the client if we find OPENAI_API_KEY; otherwise `MissingCredential`.
  pub fn from_env(settings: &GenerationSettings) -> Result<Self, ModelError> {
    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ModelError::MissingCredential)?;
    Self::new(api_key, settings)
  }
}

#[async_trait]
impl ModelClient for OpenAI {
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model, temperature = params.temperature))]
  async fn invoke(&self, system: &str, user: &str, params: KindParams) -> Result<String, ModelError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: params.temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(params.max_output_tokens),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "codeclimb-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| ModelError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(ModelError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| ModelError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }

    let text = first_choice_text(body)?;
    debug!(response_len = text.len(), "OpenAI response received");
    Ok(text)
  }
}

/// Trimmed content of the first choice. A refusal or blank content is an error.
fn first_choice_text(body: ChatCompletionResponse) -> Result<String, ModelError> {
  let message = body.choices.into_iter().next().map(|c| c.message);
  if let Some(refusal) = message.as_ref().and_then(|m| m.refusal.clone()) {
    return Err(ModelError::Refused(refusal));
  }
  let text = message
    .and_then(|m| m.content)
    .unwrap_or_default()
    .trim()
    .to_string();
  if text.is_empty() {
    return Err(ModelError::EmptyContent);
  }
  Ok(text)
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
  #[serde(default)] refusal: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_key_is_a_missing_credential() {
    let err = OpenAI::new("  ".into(), &GenerationSettings::default()).err();
    assert!(matches!(err, Some(ModelError::MissingCredential)));
  }

  #[test]
  fn error_body_message_is_extracted() {
    let body = r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("<html>"), None);
  }

  fn response(v: serde_json::Value) -> ChatCompletionResponse {
    serde_json::from_value(v).unwrap()
  }

  #[test]
  fn refusal_is_its_own_failure() {
    let body = response(serde_json::json!({
      "choices": [{ "message": { "content": null, "refusal": "I can't help with that." } }]
    }));
    match first_choice_text(body) {
      Err(ModelError::Refused(reason)) => assert_eq!(reason, "I can't help with that."),
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[test]
  fn blank_or_missing_content_is_empty() {
    let body = response(serde_json::json!({ "choices": [{ "message": { "content": "   " } }] }));
    assert!(matches!(first_choice_text(body), Err(ModelError::EmptyContent)));
    let body = response(serde_json::json!({ "choices": [] }));
    assert!(matches!(first_choice_text(body), Err(ModelError::EmptyContent)));
    let body = response(serde_json::json!({ "choices": [{ "message": { "content": " {\"a\": 1} " } }] }));
    assert_eq!(first_choice_text(body).unwrap(), "{\"a\": 1}");
  }

  #[test]
  fn request_carries_json_format_and_token_limit() {
    let req = ChatCompletionRequest {
      model: "m".into(),
      messages: vec![],
      temperature: 0.3,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(42),
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["response_format"]["type"], "json_object");
    assert_eq!(v["max_tokens"], 42);
  }
}
