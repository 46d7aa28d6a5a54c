use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A direct-message room as stored under `chats/{roomId}`.
///
/// `id` is the store-generated key, not part of the stored value.
/// `participants` is always held in canonical order: sorted by the
/// case-insensitive comparison of the two ids, original casing kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    #[serde(skip)]
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub participant_names: HashMap<String, String>,
    #[serde(default)]
    pub participant_images: HashMap<String, String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub last_message_time: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl ChatRoom {
    /// Most recent activity, for chat-list ordering. Rooms with no
    /// messages yet fall back to their creation time.
    pub fn last_activity(&self) -> i64 {
        if self.last_message_time > 0 {
            self.last_message_time
        } else {
            self.created_at
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    /// The participant on the other side of the room from `user_id`,
    /// if the room is a well-formed two-party room.
    pub fn other_participant(&self, user_id: &str) -> Option<&str> {
        if self.participants.len() != 2 {
            return None;
        }
        self.participants
            .iter()
            .find(|p| p.as_str() != user_id)
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn room() -> ChatRoom {
        ChatRoom {
            id: "r1".into(),
            participants: vec!["alice".into(), "Bob99".into()],
            participant_names: HashMap::from([
                ("alice".into(), "Alice".into()),
                ("Bob99".into(), "Bob".into()),
            ]),
            participant_images: HashMap::new(),
            last_message: String::new(),
            last_message_time: 0,
            created_at: 1700000000000,
            updated_at: 1700000000000,
        }
    }

    #[test]
    fn last_activity_falls_back_to_creation() {
        let mut r = room();
        assert_eq!(r.last_activity(), 1700000000000);
        r.last_message_time = 1700000001000;
        assert_eq!(r.last_activity(), 1700000001000);
    }

    #[test]
    fn other_participant_requires_two_party_room() {
        let r = room();
        assert_eq!(r.other_participant("alice"), Some("Bob99"));
        assert_eq!(r.other_participant("Bob99"), Some("alice"));

        let mut broken = room();
        broken.participants.push("carol".into());
        assert_eq!(broken.other_participant("alice"), None);
    }

    #[test]
    fn deserializes_from_wire_shape() {
        let value = json!({
            "participants": ["alice", "Bob99"],
            "participantNames": {"alice": "Alice", "Bob99": "Bob"},
            "participantImages": {},
            "lastMessage": "hi",
            "lastMessageTime": 1700000001000i64,
            "createdAt": 1700000000000i64,
            "updatedAt": 1700000001000i64
        });
        let r: ChatRoom = serde_json::from_value(value).unwrap();
        assert_eq!(r.participants, vec!["alice", "Bob99"]);
        assert_eq!(r.last_message, "hi");
        assert_eq!(r.id, "");
    }
}
