//! HTTP endpoint handlers. These are thin wrappers that forward to state and
//! the generator. Each handler is instrumented and logs basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::error::{QuestError, ServiceError, ValidationError};
use crate::generation::{ArrangementRequest, FeedbackRequest, HintRequest, QuestRequest};
use crate::protocol::*;
use crate::state::AppState;

/// Error response: status code plus `{error, message}` body.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
  fn from(e: ServiceError) -> Self {
    ApiError(e)
  }
}

impl From<QuestError> for ApiError {
  fn from(e: QuestError) -> Self {
    ApiError(e.into())
  }
}

impl From<ValidationError> for ApiError {
  fn from(e: ValidationError) -> Self {
    ApiError(e.into())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = match &self.0 {
      ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
      ServiceError::Quest(QuestError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
      ServiceError::Quest(QuestError::StepNotFound { .. }) => (StatusCode::NOT_FOUND, "STEP_NOT_FOUND"),
      ServiceError::Quest(QuestError::InvalidTransition { .. }) => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
      ServiceError::Quest(QuestError::Conflict(_)) => (StatusCode::CONFLICT, "CONFLICT"),
      ServiceError::Quest(QuestError::Persistence(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
    };
    (status, Json(ErrorOut { error: code, message: self.0.to_string() })).into_response()
  }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body), fields(difficulty = body.difficulty.as_str()))]
pub async fn http_generate_quest(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuestRequest>,
) -> Result<(StatusCode, Json<QuestCreatedOut>), ApiError> {
  let (quest, origin) = state.create_quest(&body).await?;
  info!(target: "quest", id = %quest.id, ?origin, "HTTP quest generated");
  Ok((StatusCode::CREATED, Json(QuestCreatedOut { quest, origin })))
}

#[instrument(level = "info", skip(state, body), fields(code_len = body.submitted_code.len()))]
pub async fn http_post_feedback(
  State(state): State<Arc<AppState>>,
  Json(body): Json<FeedbackRequest>,
) -> impl IntoResponse {
  match state.generator.generate_feedback(&body).await {
    Ok(out) => Json(out).into_response(),
    Err(e) => ApiError::from(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_hints(
  State(state): State<Arc<AppState>>,
  Json(body): Json<HintRequest>,
) -> impl IntoResponse {
  match state.generator.generate_hints(&body).await {
    Ok(out) => Json(out).into_response(),
    Err(e) => ApiError::from(e).into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(code_len = body.original_code.len()))]
pub async fn http_post_arrangement(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ArrangementRequest>,
) -> impl IntoResponse {
  match state.generator.generate_arrangement(&body).await {
    Ok(out) => Json(out).into_response(),
    Err(e) => ApiError::from(e).into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_quests(State(state): State<Arc<AppState>>) -> ApiResult<Vec<crate::domain::Quest>> {
  Ok(Json(state.list_quests().await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_quest_stats(State(state): State<Arc<AppState>>) -> ApiResult<crate::quest::QuestStats> {
  Ok(Json(state.stats().await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_quest(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<crate::domain::Quest> {
  Ok(Json(state.get_quest(&id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_quest(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  state.delete_quest(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_start_quest(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<crate::domain::Quest> {
  Ok(Json(state.start_quest(&id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_pause_quest(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<crate::domain::Quest> {
  Ok(Json(state.pause_quest(&id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_resume_quest(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> ApiResult<crate::domain::Quest> {
  Ok(Json(state.resume_quest(&id).await?))
}

#[instrument(level = "info", skip(state, body), fields(completed = body.completed))]
pub async fn http_set_step_completion(
  State(state): State<Arc<AppState>>,
  Path((id, step_id)): Path<(String, String)>,
  Json(body): Json<StepCompletionIn>,
) -> ApiResult<StepCompletionOut> {
  let (quest, outcome) = state.set_step_completion(&id, &step_id, body.completed).await?;
  info!(target: "quest", %id, %step_id, ?outcome, "HTTP step completion applied");
  Ok(Json(StepCompletionOut { quest, outcome }))
}
