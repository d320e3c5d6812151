//! WebSocket chat handler: one orchestration task per connection.
//!
//! A connection moves through CONNECTING (register, resume-or-create the
//! session, rotate the credential), ACTIVE (receive loop) and CLOSED
//! (unregister, no further sends). Per-message failures stay on the
//! connection; only transport failures end it.

use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::api::AppState;
use crate::blocks;
use crate::chat::{CONTEXT_WINDOW, Message};
use crate::document::Document;
use crate::llm::GeneratorError;

use super::registry::ConnectionSender;
use super::types::{ClientEnvelope, InboundContent, ServerEnvelope};

/// Keepalive interval for protocol-level ping frames.
const PING_INTERVAL_SECS: u64 = 30;

/// Size of the per-connection outbound buffer.
const SEND_BUFFER_SIZE: usize = 64;

/// Upper bound on one generator round trip.
const GENERATOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Documents retrieved as generation context per message.
const CONTEXT_DOCUMENTS: i64 = 3;

/// Connection parameters supplied with the upgrade request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConnectParams {
    /// Logical client identity; one live connection per id.
    pub client_id: String,
    /// Credential of a prior session to resume.
    #[serde(default)]
    pub reconnect_token: Option<String>,
}

/// The connection's writer task is gone. Treated as a transport failure by
/// the receive loop.
struct ConnectionClosed;

/// WebSocket upgrade handler.
///
/// GET /ws/chat?client_id=...&reconnect_token=...
pub async fn chat_ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ChatConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    info!("WebSocket chat upgrade from client {}", params.client_id);
    ws.on_upgrade(move |socket| handle_connection(socket, state, params))
}

async fn handle_connection(socket: WebSocket, state: AppState, params: ChatConnectParams) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEnvelope>(SEND_BUFFER_SIZE);
    state.connections.register(&params.client_id, tx.clone());

    // Writer task: serializes envelopes onto the socket and keeps the
    // connection alive with ping frames.
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
        loop {
            tokio::select! {
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { break };
                    let json = match serde_json::to_string(&envelope) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!("failed to serialize envelope: {err}");
                            continue;
                        }
                    };
                    if sink.send(WsMessage::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sink.send(WsMessage::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let (token, handshake_ok) =
        connect_session(&state, &tx, params.reconnect_token.as_deref()).await;

    if handshake_ok {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Text(payload)) => {
                    if process_text_frame(&state, &tx, &token, payload.as_str())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(WsMessage::Binary(_)) => {
                    debug!("ignoring binary frame from client {}", params.client_id);
                }
                Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => {}
                Ok(WsMessage::Close(_)) => {
                    info!("client {} closed the connection", params.client_id);
                    break;
                }
                Err(err) => {
                    warn!("transport error for client {}: {err}", params.client_id);
                    break;
                }
            }
        }
    }

    writer.abort();
    state.connections.unregister(&params.client_id, &tx);
    info!("chat connection for client {} closed", params.client_id);
}

/// Resume-or-create the session for this connection.
///
/// A resolvable prior credential keeps its transcript but is rotated onto a
/// fresh credential; an unknown one is silently treated as a fresh start.
/// History (when resumed) is sent before the new credential.
async fn connect_session(
    state: &AppState,
    tx: &ConnectionSender,
    prior: Option<&str>,
) -> (String, bool) {
    let token = match prior.and_then(|credential| state.sessions.rotate(credential)) {
        Some((token, history)) => {
            if send(tx, ServerEnvelope::ChatHistory { history }).await.is_err() {
                return (token, false);
            }
            token
        }
        None => state.sessions.create(),
    };

    let ok = send(
        tx,
        ServerEnvelope::ReconnectToken {
            token: token.clone(),
        },
    )
    .await
    .is_ok();
    (token, ok)
}

/// Decode one text frame and dispatch it. Decode failures are reported to
/// the client and the loop continues; only a dead outbound channel ends it.
async fn process_text_frame(
    state: &AppState,
    tx: &ConnectionSender,
    token: &str,
    payload: &str,
) -> Result<(), ConnectionClosed> {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            debug!("malformed envelope: {err}");
            return send(tx, error_envelope("Invalid JSON message format.")).await;
        }
    };

    match value.get("type").and_then(|tag| tag.as_str()) {
        Some("message") => {}
        other => {
            debug!("unsupported envelope type: {other:?}");
            return send(tx, error_envelope("Unsupported message type.")).await;
        }
    }

    let envelope = match serde_json::from_value::<ClientEnvelope>(value) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!("malformed message envelope: {err}");
            return send(tx, error_envelope("Invalid message payload.")).await;
        }
    };

    let ClientEnvelope::Message { content, model } = envelope;
    handle_chat_message(state, tx, token, content, model).await
}

/// Process one chat message: flatten, record the user turn, retrieve
/// document context, generate, parse, record and send the assistant turn.
async fn handle_chat_message(
    state: &AppState,
    tx: &ConnectionSender,
    token: &str,
    content: InboundContent,
    model: Option<String>,
) -> Result<(), ConnectionClosed> {
    let prompt = match content {
        InboundContent::Text(text) => text,
        InboundContent::Blocks(inbound) => blocks::flatten(&inbound),
    };
    let model = model.unwrap_or_else(|| state.default_model.clone());

    if state
        .sessions
        .append(token, Message::user(prompt.clone()))
        .is_err()
    {
        warn!("session for a live connection is gone");
        return send(tx, error_envelope("Session is no longer available.")).await;
    }

    let history = state.sessions.recent_context(token, CONTEXT_WINDOW);
    // The turn just appended goes to the generator as the prompt, not as
    // part of the history.
    let prior_turns = &history[..history.len().saturating_sub(1)];

    let context = match state.documents.search(&prompt, CONTEXT_DOCUMENTS).await {
        Ok(documents) => documents,
        Err(err) => {
            warn!("document context lookup failed: {err:#}");
            Vec::new()
        }
    };
    let sources: Vec<String> = context.iter().map(Document::display_title).collect();

    let reply = tokio::time::timeout(
        GENERATOR_TIMEOUT,
        state.generator.generate(&prompt, &context, prior_turns, &model),
    )
    .await
    .unwrap_or(Err(GeneratorError::Timeout));

    match reply {
        Ok(raw) => {
            let content = blocks::parse(&raw);
            if tx.is_closed() {
                // The client went away while the call was in flight. Discard
                // instead of recording an assistant turn nobody received.
                debug!("discarding generated reply for a closed connection");
                return Err(ConnectionClosed);
            }
            if let Err(err) = state
                .sessions
                .append(token, Message::assistant(content.clone(), model.as_str()))
            {
                warn!("failed to record assistant turn: {err}");
            }
            send(
                tx,
                ServerEnvelope::Message {
                    content,
                    model,
                    sources,
                },
            )
            .await
        }
        Err(err) => {
            warn!("response generation failed: {err}");
            send(
                tx,
                error_envelope(&format!("Failed to generate a response: {err}")),
            )
            .await
        }
    }
}

async fn send(tx: &ConnectionSender, envelope: ServerEnvelope) -> Result<(), ConnectionClosed> {
    tx.send(envelope).await.map_err(|_| ConnectionClosed)
}

fn error_envelope(content: &str) -> ServerEnvelope {
    ServerEnvelope::Error {
        content: content.to_string(),
    }
}
