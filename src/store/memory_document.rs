use crate::error::StoreError;
use crate::store::document::DocumentStore;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

/// Process-local document store keyed by `collection/id`. Reference
/// backend for tests and for embedders without a hosted document database.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<String, Value>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection: &str, id: &str) -> Result<String, StoreError> {
        if collection.is_empty() || id.is_empty() {
            return Err(StoreError::InvalidPath(format!("{collection}/{id}")));
        }
        Ok(format!("{collection}/{id}"))
    }

    fn mutate_array<F>(&self, key: String, field: &str, mutate: F)
    where
        F: FnOnce(&mut Vec<Value>),
    {
        let mut entry = self
            .documents
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let map = entry.as_object_mut().expect("entry was just made an object");
        let slot = map
            .entry(field.to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        mutate(slot.as_array_mut().expect("slot was just made an array"));
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let key = Self::key(collection, id)?;
        Ok(self.documents.get(&key).map(|doc| doc.clone()))
    }

    async fn set(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        let key = Self::key(collection, id)?;
        self.documents.insert(key, value);
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        let key = Self::key(collection, id)?;
        match self.documents.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::AlreadyExists(key)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    async fn merge(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        let key = Self::key(collection, id)?;
        let fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Backend(format!(
                    "merge expects an object, got {other}"
                )))
            }
        };
        let mut entry = self
            .documents
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let map = entry.as_object_mut().expect("entry was just made an object");
        for (field, field_value) in fields {
            map.insert(field, field_value);
        }
        Ok(())
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError> {
        let key = Self::key(collection, id)?;
        self.mutate_array(key, field, |array| {
            for value in values {
                if !array.contains(&value) {
                    array.push(value);
                }
            }
        });
        Ok(())
    }

    async fn array_remove(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError> {
        let key = Self::key(collection, id)?;
        if !self.documents.contains_key(&key) {
            return Ok(());
        }
        self.mutate_array(key, field, |array| {
            array.retain(|existing| !values.contains(existing));
        });
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let key = Self::key(collection, id)?;
        self.documents.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_is_conditional() {
        let store = MemoryDocumentStore::new();
        store
            .create("chatIndex", "alice::bob99", json!({"roomId": "r1"}))
            .await
            .unwrap();
        let err = store
            .create("chatIndex", "alice::bob99", json!({"roomId": "r2"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let winner = store.get("chatIndex", "alice::bob99").await.unwrap().unwrap();
        assert_eq!(winner["roomId"], "r1");
    }

    #[tokio::test]
    async fn merge_preserves_unrelated_fields() {
        let store = MemoryDocumentStore::new();
        store
            .set("users", "alice", json!({"name": "Alice", "chatIds": ["r1"]}))
            .await
            .unwrap();
        store
            .merge("users", "alice", json!({"image": "https://cdn/a.jpg"}))
            .await
            .unwrap();
        let doc = store.get("users", "alice").await.unwrap().unwrap();
        assert_eq!(doc["name"], "Alice");
        assert_eq!(doc["chatIds"], json!(["r1"]));
        assert_eq!(doc["image"], "https://cdn/a.jpg");
    }

    #[tokio::test]
    async fn array_union_deduplicates() {
        let store = MemoryDocumentStore::new();
        store
            .array_union("users", "alice", "chatIds", vec![json!("r1")])
            .await
            .unwrap();
        store
            .array_union("users", "alice", "chatIds", vec![json!("r1"), json!("r2")])
            .await
            .unwrap();
        let doc = store.get("users", "alice").await.unwrap().unwrap();
        assert_eq!(doc["chatIds"], json!(["r1", "r2"]));
    }

    #[tokio::test]
    async fn array_remove_tolerates_missing_targets() {
        let store = MemoryDocumentStore::new();
        // Missing document entirely.
        store
            .array_remove("users", "ghost", "chatIds", vec![json!("r1")])
            .await
            .unwrap();
        assert!(store.get("users", "ghost").await.unwrap().is_none());

        store
            .array_union("users", "alice", "chatIds", vec![json!("r1")])
            .await
            .unwrap();
        // Value not present in the array.
        store
            .array_remove("users", "alice", "chatIds", vec![json!("r9")])
            .await
            .unwrap();
        let doc = store.get("users", "alice").await.unwrap().unwrap();
        assert_eq!(doc["chatIds"], json!(["r1"]));
    }
}
