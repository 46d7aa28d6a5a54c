use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Identifies a registered live listener so it can be detached.
pub type ListenerId = u64;

/// An ordered-child query over one node of the tree: children of `path`,
/// ordered by the numeric child field `order_child`, optionally bounded to
/// the last `limit_last` entries (the window is still delivered ascending).
#[derive(Debug, Clone)]
pub struct ChildQuery {
    pub path: String,
    pub order_child: String,
    pub limit_last: Option<usize>,
}

/// A live window over a [`ChildQuery`]. The store sends the complete
/// current window (never a diff) on registration and after every mutation
/// that touches it. The channel closes when the listener is detached.
pub struct LiveWindow {
    pub listener: ListenerId,
    pub changes: mpsc::UnboundedReceiver<Vec<(String, Value)>>,
}

/// Sentinel the store resolves to its own clock at write time, in epoch
/// milliseconds. Matches the hosted realtime database convention.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

pub(crate) fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| map.len() == 1 && map.get(".sv").and_then(Value::as_str) == Some("timestamp"))
        .unwrap_or(false)
}

/// Hierarchical JSON key/value store with live queries. Paths are
/// slash-separated key sequences, e.g. `messages/{roomId}/{messageId}`.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Generates a fresh child key under `path` without writing anything.
    /// Keys are unique and lexically ordered by generation time, so
    /// children written under them keep arrival order on ties.
    async fn push_key(&self, path: &str) -> Result<String, StoreError>;

    /// Writes `value` at `path`, replacing whatever was there.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Shallow merge: each top-level key of `value` replaces the child of
    /// the same name under `path`; a `null` value removes that child.
    async fn update(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Snapshot read of the node at `path`. `None` when the path is empty.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Removes the node at `path` and everything under it.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// One-shot evaluation of an ordered-child query, ascending.
    async fn get_ordered(&self, query: &ChildQuery) -> Result<Vec<(String, Value)>, StoreError>;

    /// Registers a live listener for `query`. The initial window is
    /// delivered through the channel before this call returns.
    async fn watch(&self, query: ChildQuery) -> Result<LiveWindow, StoreError>;

    /// Detaches a listener; its channel closes. Unknown ids are a no-op.
    async fn unwatch(&self, listener: ListenerId);
}
