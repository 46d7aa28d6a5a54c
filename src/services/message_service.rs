use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult};
use crate::models::{ChatMessage, ChatRoom, MessageKind};
use crate::services::{room_messages_path, room_path};
use crate::store::{server_timestamp, ChildQuery, RealtimeStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Appends messages to a room's ordered list and maintains the room's
/// denormalized `lastMessage` summary.
#[derive(Clone)]
pub struct MessageService {
    realtime: Arc<dyn RealtimeStore>,
    config: ChatConfig,
}

impl MessageService {
    pub fn new(realtime: Arc<dyn RealtimeStore>, config: ChatConfig) -> Self {
        Self { realtime, config }
    }

    /// Stores a new message and updates the parent room's summary.
    ///
    /// Two independent writes: the message itself, then the summary. The
    /// summary write is a denormalization side-effect, so its failure is
    /// logged and swallowed; the message is already durable, and
    /// `RoomService::reconcile_room_summary` can repair the drift.
    pub async fn send(
        &self,
        room_id: &str,
        sender_id: &str,
        sender_name: &str,
        text: &str,
        kind: MessageKind,
    ) -> ChatResult<String> {
        let room_value = self
            .realtime
            .get(&room_path(room_id))
            .await?
            .ok_or(ChatError::NotFound)?;
        let room: ChatRoom = serde_json::from_value(room_value)?;
        if !room.has_participant(sender_id) {
            return Err(ChatError::Forbidden);
        }

        if kind == MessageKind::Text && text.trim().is_empty() {
            return Err(ChatError::InvalidInput("empty message".into()));
        }
        if text.chars().count() > self.config.max_message_len {
            return Err(ChatError::InvalidInput(format!(
                "message exceeds {} characters",
                self.config.max_message_len
            )));
        }

        let messages_path = room_messages_path(room_id);
        let message_id = self.realtime.push_key(&messages_path).await?;
        self.realtime
            .set(
                &format!("{messages_path}/{message_id}"),
                json!({
                    "chatId": room_id,
                    "senderId": sender_id,
                    "senderName": sender_name,
                    "message": text,
                    "timestamp": server_timestamp(),
                    "type": kind,
                    "readBy": { sender_id: server_timestamp() },
                }),
            )
            .await?;

        let summary = json!({
            "lastMessage": text,
            "lastMessageTime": server_timestamp(),
            "updatedAt": server_timestamp(),
        });
        if let Err(e) = self.realtime.update(&room_path(room_id), summary).await {
            warn!(room_id, %message_id, error = %e, "room summary update failed after send");
        }

        Ok(message_id)
    }

    /// One-shot read of a room's messages, timestamp ascending, bounded to
    /// the most recent `limit` when given. A missing room path yields an
    /// empty list, not an error.
    pub async fn messages(
        &self,
        room_id: &str,
        limit: Option<usize>,
    ) -> ChatResult<Vec<ChatMessage>> {
        let window = self
            .realtime
            .get_ordered(&ChildQuery {
                path: room_messages_path(room_id),
                order_child: "timestamp".into(),
                limit_last: limit,
            })
            .await?;
        Ok(parse_window(window))
    }
}

/// Decodes an ordered store window into messages, dropping (and logging)
/// malformed children, with a client-side re-sort by numeric timestamp
/// since the store's native ordering is not fully trusted.
pub(crate) fn parse_window(window: Vec<(String, Value)>) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = window
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<ChatMessage>(value) {
            Ok(mut message) => {
                message.id = key;
                Some(message)
            }
            Err(e) => {
                warn!(message_id = %key, error = %e, "skipping malformed message record");
                None
            }
        })
        .collect();
    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRealtimeStore;

    async fn service_with_room(room_id: &str) -> MessageService {
        let realtime = Arc::new(MemoryRealtimeStore::new());
        realtime
            .set(
                &room_path(room_id),
                json!({
                    "participants": ["alice", "Bob99"],
                    "participantNames": {"alice": "Alice", "Bob99": "Bob"},
                    "createdAt": 1, "updatedAt": 1
                }),
            )
            .await
            .unwrap();
        MessageService::new(realtime, ChatConfig::default())
    }

    #[tokio::test]
    async fn send_stores_message_with_sender_receipt() {
        let service = service_with_room("r1").await;
        let id = service
            .send("r1", "alice", "Alice", "hi", MessageKind::Text)
            .await
            .unwrap();

        let messages = service.messages("r1", None).await.unwrap();
        assert_eq!(messages.len(), 1);
        let message = &messages[0];
        assert_eq!(message.id, id);
        assert_eq!(message.message, "hi");
        assert!(message.read_by.contains_key("alice"));
        assert!(message.timestamp > 0);
    }

    #[tokio::test]
    async fn send_to_missing_room_is_not_found() {
        let service = service_with_room("r1").await;
        let err = service
            .send("nope", "alice", "Alice", "hi", MessageKind::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::NotFound));
    }

    #[tokio::test]
    async fn send_by_non_participant_is_forbidden() {
        let service = service_with_room("r1").await;
        let err = service
            .send("r1", "mallory", "Mallory", "hi", MessageKind::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden));
    }

    #[tokio::test]
    async fn empty_text_rejected_but_system_exempt() {
        let service = service_with_room("r1").await;
        let err = service
            .send("r1", "alice", "Alice", "   ", MessageKind::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));

        service
            .send("r1", "alice", "Alice", "", MessageKind::System)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn oversized_message_rejected() {
        let service = service_with_room("r1").await;
        let oversized = "x".repeat(ChatConfig::default().max_message_len + 1);
        let err = service
            .send("r1", "alice", "Alice", &oversized, MessageKind::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn messages_from_missing_room_is_empty() {
        let service = service_with_room("r1").await;
        assert!(service.messages("nope", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn limit_keeps_most_recent_messages() {
        let service = service_with_room("r1").await;
        for text in ["one", "two", "three"] {
            service
                .send("r1", "alice", "Alice", text, MessageKind::Text)
                .await
                .unwrap();
        }
        let recent = service.messages("r1", Some(2)).await.unwrap();
        let texts: Vec<&str> = recent.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
    }
}
