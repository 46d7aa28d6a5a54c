use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
}

impl Default for MessageKind {
    fn default() -> Self {
        MessageKind::Text
    }
}

/// A single message as stored under `messages/{roomId}/{messageId}`.
///
/// `id` is the store-generated child key, not part of the stored value.
/// `readBy` maps a reader id to the server timestamp of their read receipt;
/// it is the only field ever mutated after the message is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub read_by: HashMap<String, i64>,
}

impl ChatMessage {
    pub fn is_unread_by(&self, user_id: &str) -> bool {
        self.sender_id != user_id && !self.read_by.contains_key(user_id)
    }
}
