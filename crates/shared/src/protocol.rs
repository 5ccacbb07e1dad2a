//! Real-time socket frame format.
//!
//! Every frame, in both directions, is a JSON object `{"type": ..., "data": ...}`.

use serde::{Deserialize, Serialize};

/// Generic event name every frame is also delivered under.
pub const MESSAGE_EVENT: &str = "message";

/// A single socket frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SocketFrame {
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Decode the payload into a concrete type.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Chat message pushed on `chat_message` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
