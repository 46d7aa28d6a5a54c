use crate::error::StoreError;
use crate::store::realtime::{
    is_server_timestamp, ChildQuery, ListenerId, LiveWindow, RealtimeStore,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Process-local realtime tree store. Reference backend for tests and for
/// embedders that have not wired a hosted realtime database.
///
/// Push keys are fixed-width counters, so they sort lexically in
/// generation order and equal-timestamp children keep arrival order under
/// ordered-child queries.
pub struct MemoryRealtimeStore {
    tree: Mutex<Value>,
    watchers: DashMap<ListenerId, Watcher>,
    next_listener: AtomicU64,
    next_key: AtomicU64,
}

struct Watcher {
    query: ChildQuery,
    tx: mpsc::UnboundedSender<Vec<(String, Value)>>,
}

impl Default for MemoryRealtimeStore {
    fn default() -> Self {
        Self {
            tree: Mutex::new(Value::Object(Map::new())),
            watchers: DashMap::new(),
            next_listener: AtomicU64::new(1),
            next_key: AtomicU64::new(1),
        }
    }
}

impl MemoryRealtimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Sends the current window to every watcher whose query overlaps the
    /// mutated path. Windows are computed under the tree lock; delivery
    /// happens after it is released.
    fn notify(&self, mutated_path: &str) {
        let mut deliveries: Vec<(ListenerId, mpsc::UnboundedSender<Vec<(String, Value)>>, Vec<(String, Value)>)> =
            Vec::new();
        {
            let tree = self.tree.lock().expect("realtime tree lock poisoned");
            for entry in self.watchers.iter() {
                if paths_overlap(mutated_path, &entry.query.path) {
                    let window = evaluate_query(&tree, &entry.query);
                    deliveries.push((*entry.key(), entry.tx.clone(), window));
                }
            }
        }
        for (id, tx, window) in deliveries {
            if tx.send(window).is_err() {
                self.watchers.remove(&id);
            }
        }
    }
}

#[async_trait]
impl RealtimeStore for MemoryRealtimeStore {
    async fn push_key(&self, path: &str) -> Result<String, StoreError> {
        split_path(path)?;
        let n = self.next_key.fetch_add(1, Ordering::Relaxed);
        Ok(format!("mk{n:016x}"))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let resolved = resolve_timestamps(value, Self::now_millis());
        {
            let mut tree = self.tree.lock().expect("realtime tree lock poisoned");
            if resolved.is_null() {
                remove_node(&mut tree, &segments);
            } else {
                write_node(&mut tree, &segments, resolved);
            }
        }
        self.notify(path);
        Ok(())
    }

    async fn update(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Backend(format!(
                    "update expects an object, got {other}"
                )))
            }
        };
        let now = Self::now_millis();
        {
            let mut tree = self.tree.lock().expect("realtime tree lock poisoned");
            for (key, field_value) in fields {
                let mut child = segments.clone();
                child.push(key);
                if field_value.is_null() {
                    remove_node(&mut tree, &child);
                } else {
                    write_node(&mut tree, &child, resolve_timestamps(field_value, now));
                }
            }
        }
        self.notify(path);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segments = split_path(path)?;
        let tree = self.tree.lock().expect("realtime tree lock poisoned");
        Ok(read_node(&tree, &segments).cloned())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        {
            let mut tree = self.tree.lock().expect("realtime tree lock poisoned");
            remove_node(&mut tree, &segments);
        }
        self.notify(path);
        Ok(())
    }

    async fn get_ordered(&self, query: &ChildQuery) -> Result<Vec<(String, Value)>, StoreError> {
        split_path(&query.path)?;
        let tree = self.tree.lock().expect("realtime tree lock poisoned");
        Ok(evaluate_query(&tree, query))
    }

    async fn watch(&self, query: ChildQuery) -> Result<LiveWindow, StoreError> {
        split_path(&query.path)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = {
            let tree = self.tree.lock().expect("realtime tree lock poisoned");
            evaluate_query(&tree, &query)
        };
        // The receiver is still in hand, so this send cannot fail.
        let _ = tx.send(initial);
        let listener = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.watchers.insert(listener, Watcher { query, tx });
        Ok(LiveWindow {
            listener,
            changes: rx,
        })
    }

    async fn unwatch(&self, listener: ListenerId) {
        self.watchers.remove(&listener);
    }
}

fn split_path(path: &str) -> Result<Vec<String>, StoreError> {
    let segments: Vec<String> = path.split('/').map(str::to_owned).collect();
    if segments.is_empty() || segments.iter().any(String::is_empty) {
        return Err(StoreError::InvalidPath(path.to_owned()));
    }
    Ok(segments)
}

/// A mutation at `mutated` is visible to a query rooted at `watched` when
/// either path is a segment-prefix of the other.
fn paths_overlap(mutated: &str, watched: &str) -> bool {
    let m: Vec<&str> = mutated.split('/').collect();
    let w: Vec<&str> = watched.split('/').collect();
    let shorter = m.len().min(w.len());
    m[..shorter] == w[..shorter]
}

fn read_node<'a>(tree: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut node = tree;
    for segment in segments {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

fn write_node(tree: &mut Value, segments: &[String], value: Value) {
    let (last, parents) = segments.split_last().expect("path segments are non-empty");
    let mut node = tree;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = node
            .as_object_mut()
            .expect("node was just made an object")
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    node.as_object_mut()
        .expect("node was just made an object")
        .insert(last.clone(), value);
}

fn remove_node(tree: &mut Value, segments: &[String]) {
    let (last, parents) = match segments.split_last() {
        Some(parts) => parts,
        None => return,
    };
    let mut node = tree;
    for segment in parents {
        match node.as_object_mut().and_then(|map| map.get_mut(segment)) {
            Some(child) => node = child,
            None => return,
        }
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(last);
    }
}

fn evaluate_query(tree: &Value, query: &ChildQuery) -> Vec<(String, Value)> {
    let segments: Vec<String> = query.path.split('/').map(str::to_owned).collect();
    let children = match read_node(tree, &segments).and_then(Value::as_object) {
        Some(map) => map,
        None => return Vec::new(),
    };
    let mut entries: Vec<(String, Value)> = children
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    entries.sort_by(|(key_a, value_a), (key_b, value_b)| {
        let order_a = order_value(value_a, &query.order_child);
        let order_b = order_value(value_b, &query.order_child);
        order_a.cmp(&order_b).then_with(|| key_a.cmp(key_b))
    });
    if let Some(limit) = query.limit_last {
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
    }
    entries
}

fn order_value(value: &Value, child: &str) -> i64 {
    value.get(child).and_then(Value::as_i64).unwrap_or(0)
}

fn resolve_timestamps(value: Value, now: i64) -> Value {
    if is_server_timestamp(&value) {
        return Value::from(now);
    }
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (key, resolve_timestamps(child, now)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| resolve_timestamps(item, now))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::realtime::server_timestamp;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_remove_roundtrip() {
        let store = MemoryRealtimeStore::new();
        store.set("chats/r1", json!({"lastMessage": "hi"})).await.unwrap();
        let value = store.get("chats/r1").await.unwrap().unwrap();
        assert_eq!(value["lastMessage"], "hi");

        store.remove("chats/r1").await.unwrap();
        assert!(store.get("chats/r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_and_null_removes() {
        let store = MemoryRealtimeStore::new();
        store
            .set("chats/r1", json!({"lastMessage": "hi", "updatedAt": 5}))
            .await
            .unwrap();
        store
            .update("chats/r1", json!({"lastMessage": "bye", "stale": null}))
            .await
            .unwrap();
        let value = store.get("chats/r1").await.unwrap().unwrap();
        assert_eq!(value["lastMessage"], "bye");
        assert_eq!(value["updatedAt"], 5);
    }

    #[tokio::test]
    async fn server_timestamps_resolve_to_clock() {
        let store = MemoryRealtimeStore::new();
        let before = Utc::now().timestamp_millis();
        store
            .set("messages/r1/m1", json!({"timestamp": server_timestamp()}))
            .await
            .unwrap();
        let after = Utc::now().timestamp_millis();
        let ts = store.get("messages/r1/m1").await.unwrap().unwrap()["timestamp"]
            .as_i64()
            .unwrap();
        assert!(ts >= before && ts <= after);
    }

    #[tokio::test]
    async fn push_keys_sort_in_generation_order() {
        let store = MemoryRealtimeStore::new();
        let first = store.push_key("messages/r1").await.unwrap();
        let second = store.push_key("messages/r1").await.unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn ordered_query_sorts_and_limits() {
        let store = MemoryRealtimeStore::new();
        store.set("messages/r1/a", json!({"timestamp": 30})).await.unwrap();
        store.set("messages/r1/b", json!({"timestamp": 10})).await.unwrap();
        store.set("messages/r1/c", json!({"timestamp": 20})).await.unwrap();

        let query = ChildQuery {
            path: "messages/r1".into(),
            order_child: "timestamp".into(),
            limit_last: Some(2),
        };
        let window = store.get_ordered(&query).await.unwrap();
        let keys: Vec<&str> = window.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn watch_delivers_initial_and_change_windows() {
        let store = MemoryRealtimeStore::new();
        store.set("messages/r1/a", json!({"timestamp": 1})).await.unwrap();

        let mut live = store
            .watch(ChildQuery {
                path: "messages/r1".into(),
                order_child: "timestamp".into(),
                limit_last: None,
            })
            .await
            .unwrap();

        let initial = live.changes.recv().await.unwrap();
        assert_eq!(initial.len(), 1);

        store.set("messages/r1/b", json!({"timestamp": 2})).await.unwrap();
        let next = live.changes.recv().await.unwrap();
        assert_eq!(next.len(), 2);

        store.unwatch(live.listener).await;
        store.set("messages/r1/c", json!({"timestamp": 3})).await.unwrap();
        assert!(live.changes.recv().await.is_none());
    }

    #[tokio::test]
    async fn mutation_outside_watched_path_is_silent() {
        let store = MemoryRealtimeStore::new();
        let mut live = store
            .watch(ChildQuery {
                path: "messages/r1".into(),
                order_child: "timestamp".into(),
                limit_last: None,
            })
            .await
            .unwrap();
        let _ = live.changes.recv().await.unwrap();

        store.set("messages/r2/a", json!({"timestamp": 1})).await.unwrap();
        assert!(live.changes.try_recv().is_err());
    }
}
