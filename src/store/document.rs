use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

/// Document-oriented point store: one JSON document per (collection, id).
///
/// Mirrors the subset of a hosted document database this core relies on:
/// point get/set, conditional create, shallow merge, and the
/// `arrayUnion`/`arrayRemove` set-mutation primitives used for `chatIds`
/// and `blockedUsers`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Snapshot read. `None` when the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Full overwrite; creates the document if absent.
    async fn set(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError>;

    /// Conditional create: fails with [`StoreError::AlreadyExists`] when a
    /// document with this id is already present. The uniqueness primitive
    /// the pair index is built on.
    async fn create(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError>;

    /// Shallow merge of top-level fields into the document; creates the
    /// document when absent.
    async fn merge(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError>;

    /// Adds `values` to the array field `field`, skipping entries already
    /// present (set semantics). Creates document and field as needed.
    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError>;

    /// Removes every occurrence of each of `values` from the array field.
    /// Missing document or field is a no-op.
    async fn array_remove(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError>;

    /// Deletes the document. Missing document is a no-op.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
