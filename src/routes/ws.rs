//! WebSocket upgrade + message loop. Each client message is parsed as JSON and forwarded to
//! `logic`; one JSON reply per request. An open socket keeps the session alive, and the
//! last one closing counts as environment teardown.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::{IntoResponse, Response},
};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::AppError;
use crate::logic;
use crate::protocol::{AnswerIn, ClientWsMessage, ServerWsMessage, WsQuery};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state), fields(session = %q.session))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<WsQuery>,
) -> Response {
  if state.sessions.get(&q.session).await.is_none() {
    return AppError::SessionNotFound(q.session).into_response();
  }
  info!(target: "interview_backend", session = %q.session, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, q.session))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, session_id: String) {
  if let Err(e) = logic::socket_opened(&state, &session_id).await {
    warn!(target: "interview_backend", error = %e, "WebSocket session vanished before connect");
    return;
  }
  info!(target: "interview_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "interview_backend", "WS received: {:?}", incoming_kind(&incoming));
            handle_client_ws(incoming, &state, &session_id).await
          }
          Err(e) => ServerWsMessage::Error {
            code: "BAD_REQUEST",
            message: format!("Invalid JSON: {}", e),
            retryable: false,
          },
        };

        let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "code": "INTERNAL", "message": format!("Serialization error: {}", e), "retryable": false })
            .to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "interview_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => {
        let _ = socket.send(Message::Pong(payload)).await;
      }
      Message::Close(_) => break,
      _ => {}
    }
  }

  match logic::socket_closed(&state, &session_id).await {
    Ok(paused) => info!(target: "interview_backend", paused, "WebSocket disconnected"),
    Err(e) => warn!(target: "interview_backend", error = %e, "WebSocket disconnected; teardown failed"),
  }
}

/// Message type without its payload; answer text stays out of the logs.
fn incoming_kind(msg: &ClientWsMessage) -> &'static str {
  match msg {
    ClientWsMessage::Ping => "ping",
    ClientWsMessage::Status => "status",
    ClientWsMessage::SubmitAnswer { .. } => "submit_answer",
    ClientWsMessage::Draft { .. } => "draft",
    ClientWsMessage::Pause => "pause",
    ClientWsMessage::Resume => "resume",
  }
}

fn error_message(e: AppError) -> ServerWsMessage {
  let (_, code, message, retryable) = e.parts();
  ServerWsMessage::Error { code, message, retryable }
}

async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session_id: &str) -> ServerWsMessage {
  let result = match msg {
    ClientWsMessage::Ping => return ServerWsMessage::Pong,

    ClientWsMessage::Status => logic::session_status(state, session_id)
      .await
      .map(|session| ServerWsMessage::Session { session }),

    ClientWsMessage::SubmitAnswer { response, auto_submitted, question_id } => {
      let body = AnswerIn { response, auto_submitted, question_id };
      logic::submit_answer(state, session_id, body)
        .await
        .map(|(result, session)| ServerWsMessage::AnswerResult { result, session })
    }

    ClientWsMessage::Draft { text } => match logic::save_draft(state, session_id, text).await {
      Ok(()) => return ServerWsMessage::Pong,
      Err(e) => Err(e),
    },

    ClientWsMessage::Pause => logic::pause_interview(state, session_id)
      .await
      .map(|(_, session)| ServerWsMessage::Session { session }),

    ClientWsMessage::Resume => logic::resume_interview(state, session_id)
      .await
      .map(|session| ServerWsMessage::Session { session }),
  };
  result.unwrap_or_else(error_message)
}
