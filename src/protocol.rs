//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and clients independently.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Quest;
use crate::generation::Origin;
use crate::quest::StepOutcome;

/// Messages a client can send over WebSocket.
/// The three update events are accepted and acknowledged; their effects live
/// with other services.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientWsMessage {
  Ping,
  QuestUpdate {
    #[serde(default)]
    data: Value,
  },
  SkillProgressUpdate {
    #[serde(default)]
    data: Value,
  },
  RatingUpdate {
    #[serde(default)]
    data: Value,
  },
}

impl ClientWsMessage {
  pub fn event_name(&self) -> &'static str {
    match self {
      ClientWsMessage::Ping => "ping",
      ClientWsMessage::QuestUpdate { .. } => "quest-update",
      ClientWsMessage::SkillProgressUpdate { .. } => "skill-progress-update",
      ClientWsMessage::RatingUpdate { .. } => "rating-update",
    }
  }

  /// The event payload, if the message carries one.
  pub fn payload(&self) -> Option<&Value> {
    match self {
      ClientWsMessage::Ping => None,
      ClientWsMessage::QuestUpdate { data }
      | ClientWsMessage::SkillProgressUpdate { data }
      | ClientWsMessage::RatingUpdate { data } => Some(data),
    }
  }
}

/// Messages the server sends over WebSocket.
/// `QuestUpdated` is broadcast to every connected client on each quest mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerWsMessage {
  Pong,
  QuestUpdated { quest: Quest },
  Ack { event: String },
  Error { message: String },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
pub struct QuestCreatedOut {
  pub quest: Quest,
  pub origin: Origin,
}

#[derive(Debug, Deserialize)]
pub struct StepCompletionIn {
  pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct StepCompletionOut {
  pub quest: Quest,
  pub outcome: StepOutcome,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
  pub error: &'static str,
  pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn inbound_events_use_kebab_case_tags() {
    let m: ClientWsMessage = serde_json::from_value(json!({ "type": "skill-progress-update", "data": { "skill": "rust" } })).unwrap();
    assert_eq!(m.event_name(), "skill-progress-update");
    assert_eq!(m.payload(), Some(&json!({ "skill": "rust" })));
    let m: ClientWsMessage = serde_json::from_value(json!({ "type": "rating-update" })).unwrap();
    assert!(matches!(m, ClientWsMessage::RatingUpdate { data: Value::Null }));
    assert!(serde_json::from_value::<ClientWsMessage>(json!({ "type": "quest-updated" })).is_err());
  }

  #[test]
  fn outbound_ack_shape() {
    let v = serde_json::to_value(ServerWsMessage::Ack { event: "rating-update".into() }).unwrap();
    assert_eq!(v, json!({ "type": "ack", "event": "rating-update" }));
  }
}
