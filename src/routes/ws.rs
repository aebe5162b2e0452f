//! WebSocket upgrade + message loop.
//!
//! Each connection does two things at once:
//!   - replies to client messages (one JSON reply per message)
//!   - forwards every `quest-updated` broadcast from the state

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, instrument, warn};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::util::trunc_for_log;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "codeclimb", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "codeclimb", "WebSocket connected");
  let mut updates = state.events.subscribe();

  loop {
    let outgoing = tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => Some(encode(&reply_to(&txt))),
        Some(Ok(Message::Ping(payload))) => Some(Message::Pong(payload)),
        Some(Ok(Message::Close(_))) | None => break,
        Some(Ok(_)) => None,
        Some(Err(e)) => {
          warn!(target: "codeclimb", error = %e, "WS receive error");
          break;
        }
      },
      update = updates.recv() => match update {
        Ok(msg) => Some(encode(&msg)),
        Err(RecvError::Lagged(skipped)) => {
          warn!(target: "codeclimb", skipped, "WS subscriber lagged; some quest updates were dropped");
          None
        }
        Err(RecvError::Closed) => break,
      },
    };

    if let Some(msg) = outgoing {
      if let Err(e) = socket.send(msg).await {
        error!(target: "codeclimb", error = %e, "WS send error");
        break;
      }
    }
  }
  info!(target: "codeclimb", "WebSocket disconnected");
}

fn encode(msg: &ServerWsMessage) -> Message {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  Message::Text(out)
}

/// Parse one client message and build the reply.
fn reply_to(txt: &str) -> ServerWsMessage {
  match serde_json::from_str::<ClientWsMessage>(txt) {
    Ok(ClientWsMessage::Ping) => ServerWsMessage::Pong,
    Ok(incoming) => {
      let event = incoming.event_name();
      let payload = incoming.payload().map(|d| trunc_for_log(&d.to_string(), 200)).unwrap_or_default();
      debug!(target: "codeclimb", event, %payload, "WS event accepted");
      ServerWsMessage::Ack { event: event.to_string() }
    }
    Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
  }
}
