//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket frame protocol between the chat gateway and the API
//! server. The gateway bridges the actual chat platform; this server only
//! sees text messages keyed by the platform's numeric user id.

use serde::{Deserialize, Serialize};

//=========================================================================================
// Frames Sent FROM the Gateway TO the Server
//=========================================================================================

/// Represents the structured frames the chat gateway can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Identifies the user this socket belongs to. This must be the first
    /// frame sent on the connection.
    Hello { external_id: i64, name: String },

    /// One inbound chat message from the user.
    Text { content: String },
}

//=========================================================================================
// Frames Sent FROM the Server TO the Gateway
//=========================================================================================
// NOTE: Document bytes are sent as one raw Binary frame immediately after the
// `Document` frame that describes them.
//=========================================================================================

/// Represents the structured frames the server can send to the gateway.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Confirms the handshake; the gateway may start forwarding messages.
    Ready { external_id: i64 },

    /// Formatted reply text to show the user.
    Text { content: String },

    /// Announces a binary attachment. The file bytes follow as the next
    /// Binary frame on this socket.
    Document {
        file_name: String,
        mime_type: String,
        caption: String,
    },

    /// Reports a fatal error to the gateway.
    Error { message: String },
}
