use crate::config::ChatConfig;
use crate::error::ChatResult;
use crate::models::ChatMessage;
use crate::services::message_service::parse_window;
use crate::services::room_messages_path;
use crate::store::{ChildQuery, ListenerId, RealtimeStore};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Invoked with the complete ordered message window on every change:
/// level-triggered, never an incremental patch.
pub type MessageCallback = Arc<dyn Fn(Vec<ChatMessage>) + Send + Sync>;

/// Opens bounded live queries over room message lists.
#[derive(Clone)]
pub struct SubscriptionManager {
    realtime: Arc<dyn RealtimeStore>,
    config: ChatConfig,
}

impl SubscriptionManager {
    pub fn new(realtime: Arc<dyn RealtimeStore>, config: ChatConfig) -> Self {
        Self { realtime, config }
    }

    /// Live query bounded to the configured message window.
    pub async fn subscribe(
        &self,
        room_id: &str,
        callback: MessageCallback,
    ) -> ChatResult<Subscription> {
        self.subscribe_bounded(room_id, callback, Some(self.config.message_window))
            .await
    }

    /// Live query with an explicit window; `None` leaves it unbounded.
    /// The callback fires with the initial window and after every
    /// subsequent mutation, always with the full visible set re-sorted by
    /// timestamp ascending.
    pub async fn subscribe_bounded(
        &self,
        room_id: &str,
        callback: MessageCallback,
        limit: Option<usize>,
    ) -> ChatResult<Subscription> {
        let live = self
            .realtime
            .watch(ChildQuery {
                path: room_messages_path(room_id),
                order_child: "timestamp".into(),
                limit_last: limit,
            })
            .await?;
        let listener = live.listener;
        let mut changes = live.changes;
        let task = tokio::spawn(async move {
            while let Some(window) = changes.recv().await {
                callback(parse_window(window));
            }
        });
        Ok(Subscription {
            listener,
            realtime: Arc::clone(&self.realtime),
            task,
        })
    }
}

/// Handle to a live message listener. Call [`Subscription::unsubscribe`]
/// on teardown; dropping the handle without it leaves the listener (and
/// its delivery task) attached.
pub struct Subscription {
    listener: ListenerId,
    realtime: Arc<dyn RealtimeStore>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Detaches the listener and waits for the delivery task to drain.
    pub async fn unsubscribe(self) {
        self.realtime.unwatch(self.listener).await;
        let _ = self.task.await;
    }
}
