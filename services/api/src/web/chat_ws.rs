//! services/api/src/web/chat_ws.rs
//!
//! The WebSocket chat transport: the entry point for the gateway connection
//! that bridges the chat platform. Each socket carries one user's messages;
//! replies and document deliveries flow back over the same socket.

use crate::{
    bot,
    bot::replies,
    web::{
        protocol::{ClientFrame, ServerFrame},
        state::AppState,
    },
};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde::Deserialize;
use std::sync::Arc;
use study_shelf_core::ports::{ChatChannel, PortError, PortResult};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Deserialize)]
pub struct ChatSocketQuery {
    pub token: Option<String>,
}

/// The handler for upgrading HTTP requests to gateway WebSocket connections.
/// The gateway authenticates with the shared chat token.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ChatSocketQuery>,
) -> Response {
    let Some(expected) = app_state.config.chat_token.clone() else {
        // No token configured: the chat subsystem is inert.
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    if query.token.as_deref() != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    // The sender is wrapped in an Arc<Mutex<>> so the channel impl and this
    // loop can share it.
    let (sender, mut receiver) = socket.split();
    let ws_sender = Arc::new(Mutex::new(sender));

    // --- 1. Handshake Phase ---
    let (external_id, name) = match receiver.next().await {
        Some(Ok(Message::Text(hello_json))) => {
            match serde_json::from_str::<ClientFrame>(&hello_json) {
                Ok(ClientFrame::Hello { external_id, name }) => (external_id, name),
                _ => {
                    error!("First frame was not a valid Hello frame.");
                    let err = ServerFrame::Error {
                        message: "Expected a Hello frame.".to_string(),
                    };
                    let err_json = serde_json::to_string(&err).unwrap();
                    let _ = ws_sender
                        .lock()
                        .await
                        .send(Message::Text(err_json.into()))
                        .await;
                    return;
                }
            }
        }
        _ => {
            error!("Gateway disconnected before sending Hello.");
            return;
        }
    };
    info!("Chat socket open for external user {} ({})", external_id, name);

    let channel = SocketChannel {
        sender: ws_sender.clone(),
    };

    let ready = ServerFrame::Ready { external_id };
    let ready_json = serde_json::to_string(&ready).unwrap();
    if ws_sender
        .lock()
        .await
        .send(Message::Text(ready_json.into()))
        .await
        .is_err()
    {
        error!("Failed to send Ready frame.");
        return;
    }

    // --- 2. Main Message Loop ---
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Text { content }) => {
                    if let Err(e) =
                        bot::handle_message(&app_state, &channel, external_id, &name, &content)
                            .await
                    {
                        error!(
                            "Failed to handle message from user {}: {:?}",
                            external_id, e
                        );
                        let _ = channel.send_text(replies::retry_apology()).await;
                    }
                }
                Ok(ClientFrame::Hello { .. }) => {
                    warn!("Received subsequent Hello frame, which is ignored.");
                }
                Err(e) => {
                    warn!("Failed to deserialize client frame: {}", e);
                }
            },
            Message::Close(_) => {
                info!("Gateway sent close frame.");
                break;
            }
            _ => {}
        }
    }

    info!("Chat socket closed for external user {}", external_id);
}

//=========================================================================================
// `ChatChannel` over one WebSocket
//=========================================================================================

/// Writes reply frames to the socket this user's messages arrived on.
struct SocketChannel {
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
}

#[async_trait]
impl ChatChannel for SocketChannel {
    async fn send_text(&self, text: &str) -> PortResult<()> {
        let frame = ServerFrame::Text {
            content: text.to_string(),
        };
        let json = serde_json::to_string(&frame)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.sender
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to send text frame: {e}")))
    }

    async fn send_document(
        &self,
        file_name: &str,
        mime_type: &str,
        caption: &str,
        data: Bytes,
    ) -> PortResult<()> {
        let frame = ServerFrame::Document {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            caption: caption.to_string(),
        };
        let json = serde_json::to_string(&frame)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Both frames go out under one lock so another reply can't slide in
        // between the announcement and its bytes.
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to send document frame: {e}")))?;
        sender
            .send(Message::Binary(data))
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to send document bytes: {e}")))
    }
}
