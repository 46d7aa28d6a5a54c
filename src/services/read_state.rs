use crate::error::{ChatError, ChatResult};
use crate::models::{ChatMessage, UserRecord};
use crate::services::subscription::{MessageCallback, Subscription, SubscriptionManager};
use crate::services::{message_path, room_messages_path, USERS_COLLECTION};
use crate::store::{server_timestamp, DocumentStore, RealtimeStore};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Maintains per-message read receipts and derives unread counts.
#[derive(Clone)]
pub struct ReadStateTracker {
    realtime: Arc<dyn RealtimeStore>,
    documents: Arc<dyn DocumentStore>,
}

impl ReadStateTracker {
    pub fn new(realtime: Arc<dyn RealtimeStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { realtime, documents }
    }

    /// Records `userId`'s read receipt on a message. Idempotent: a second
    /// call neither errors nor replaces the first-read timestamp. Missing
    /// message is an error.
    pub async fn mark_read(&self, room_id: &str, message_id: &str, user_id: &str) -> ChatResult<()> {
        let path = message_path(room_id, message_id);
        let value = self.realtime.get(&path).await?.ok_or(ChatError::NotFound)?;
        let already_read = value
            .get("readBy")
            .and_then(Value::as_object)
            .map(|readers| readers.contains_key(user_id))
            .unwrap_or(false);
        if already_read {
            return Ok(());
        }
        self.realtime
            .update(
                &format!("{path}/readBy"),
                json!({ user_id: server_timestamp() }),
            )
            .await?;
        Ok(())
    }

    /// Marks every message in the room that `userId` has not read and did
    /// not send. Returns how many receipts were newly written.
    pub async fn mark_room_read(&self, room_id: &str, user_id: &str) -> ChatResult<usize> {
        let mut marked = 0;
        for message in self.room_messages(room_id).await? {
            if message.is_unread_by(user_id) {
                self.mark_read(room_id, &message.id, user_id).await?;
                marked += 1;
            }
        }
        Ok(marked)
    }

    /// Messages in the room the user has not read and did not send.
    pub async fn unread_count_for_room(&self, room_id: &str, user_id: &str) -> ChatResult<usize> {
        let messages = self.room_messages(room_id).await?;
        Ok(messages.iter().filter(|m| m.is_unread_by(user_id)).count())
    }

    /// Sum of unread counts across every room in the user's `chatIds`.
    /// Best-effort: any per-room failure is logged and counted as zero,
    /// so one flaky room cannot take the badge down with it.
    pub async fn total_unread_count(&self, user_id: &str) -> usize {
        let chat_ids = match self.documents.get(USERS_COLLECTION, user_id).await {
            Ok(Some(doc)) => match serde_json::from_value::<UserRecord>(doc) {
                Ok(record) => record.chat_ids,
                Err(e) => {
                    warn!(user_id, error = %e, "malformed user record, unread total is zero");
                    return 0;
                }
            },
            Ok(None) => return 0,
            Err(e) => {
                warn!(user_id, error = %e, "user record lookup failed, unread total is zero");
                return 0;
            }
        };
        let mut total = 0;
        for room_id in &chat_ids {
            match self.unread_count_for_room(room_id, user_id).await {
                Ok(count) => total += count,
                Err(e) => {
                    warn!(user_id, %room_id, error = %e, "unread count failed, treating as zero");
                }
            }
        }
        total
    }

    async fn room_messages(&self, room_id: &str) -> ChatResult<Vec<ChatMessage>> {
        let node = self.realtime.get(&room_messages_path(room_id)).await?;
        let children = match node.as_ref().and_then(Value::as_object) {
            Some(map) => map,
            None => return Ok(Vec::new()),
        };
        let window: Vec<(String, Value)> = children
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(crate::services::message_service::parse_window(window))
    }
}

/// Running unread badge for one user, driven by each room's own message
/// stream instead of a timer-driven recomputation across all rooms. A
/// room's counter is recomputed only when that room's stream ticks.
pub struct UnreadAggregator {
    user_id: String,
    documents: Arc<dyn DocumentStore>,
    subscriptions: SubscriptionManager,
    counters: Arc<DashMap<String, usize>>,
    room_streams: HashMap<String, Subscription>,
}

impl UnreadAggregator {
    pub fn new(
        user_id: impl Into<String>,
        documents: Arc<dyn DocumentStore>,
        subscriptions: SubscriptionManager,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            documents,
            subscriptions,
            counters: Arc::new(DashMap::new()),
            room_streams: HashMap::new(),
        }
    }

    /// Re-reads the user's `chatIds` and brings the subscribed room set in
    /// line: new rooms get a stream and a counter, departed rooms lose
    /// both. Rooms come and go rarely; messages arrive often. This is the
    /// only part that touches the user document.
    pub async fn sync_rooms(&mut self) -> ChatResult<()> {
        let chat_ids: Vec<String> = match self.documents.get(USERS_COLLECTION, &self.user_id).await? {
            Some(doc) => serde_json::from_value::<UserRecord>(doc)?.chat_ids,
            None => Vec::new(),
        };

        let departed: Vec<String> = self
            .room_streams
            .keys()
            .filter(|room_id| !chat_ids.contains(room_id))
            .cloned()
            .collect();
        for room_id in departed {
            if let Some(stream) = self.room_streams.remove(&room_id) {
                stream.unsubscribe().await;
            }
            self.counters.remove(&room_id);
        }

        for room_id in chat_ids {
            if self.room_streams.contains_key(&room_id) {
                continue;
            }
            self.counters.insert(room_id.clone(), 0);
            let counters = Arc::clone(&self.counters);
            let user_id = self.user_id.clone();
            let counter_room = room_id.clone();
            let callback: MessageCallback = Arc::new(move |window| {
                let unread = window.iter().filter(|m| m.is_unread_by(&user_id)).count();
                counters.insert(counter_room.clone(), unread);
            });
            // Unbounded window: the badge counts every unread message, not
            // just the visible tail.
            let stream = self
                .subscriptions
                .subscribe_bounded(&room_id, callback, None)
                .await?;
            self.room_streams.insert(room_id, stream);
        }
        Ok(())
    }

    /// Current badge count, summed from the maintained per-room counters.
    pub fn total(&self) -> usize {
        self.counters.iter().map(|entry| *entry.value()).sum()
    }

    /// Detaches every room stream.
    pub async fn shutdown(mut self) {
        for (_, stream) in self.room_streams.drain() {
            stream.unsubscribe().await;
        }
    }
}
