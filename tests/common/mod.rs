//! Shared fixtures: an in-memory chat core and a failure-injecting
//! document store for exercising the swallow-and-log paths.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wander_chat::{
    ChatConfig, ChatCore, DocumentStore, MemoryDocumentStore, MemoryRealtimeStore, StoreError,
};

pub struct Harness {
    pub core: ChatCore,
    pub realtime: Arc<MemoryRealtimeStore>,
    pub documents: Arc<MemoryDocumentStore>,
}

pub fn harness() -> Harness {
    let config = ChatConfig::default();
    let realtime = Arc::new(MemoryRealtimeStore::new());
    let documents = Arc::new(MemoryDocumentStore::new());
    let core = ChatCore::new(
        Arc::clone(&realtime) as Arc<dyn wander_chat::RealtimeStore>,
        Arc::clone(&documents) as Arc<dyn DocumentStore>,
        config,
    );
    Harness {
        core,
        realtime,
        documents,
    }
}

/// Document store that can be switched into failing reads of the `users`
/// collection, or writes to the `blockedUsers` field, while passing
/// everything else through to an in-memory store. Exercises the
/// swallow-and-log paths and the partial-failure composite.
pub struct FlakyDocumentStore {
    inner: MemoryDocumentStore,
    fail_user_reads: AtomicBool,
    fail_block_writes: AtomicBool,
}

impl FlakyDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryDocumentStore::new(),
            fail_user_reads: AtomicBool::new(false),
            fail_block_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_user_reads(&self, fail: bool) {
        self.fail_user_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_block_writes(&self, fail: bool) {
        self.fail_block_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        if collection == "users" && self.fail_user_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".into()));
        }
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        self.inner.set(collection, id, value).await
    }

    async fn create(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        self.inner.create(collection, id, value).await
    }

    async fn merge(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        self.inner.merge(collection, id, value).await
    }

    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError> {
        if field == "blockedUsers" && self.fail_block_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        self.inner.array_union(collection, id, field, values).await
    }

    async fn array_remove(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError> {
        self.inner.array_remove(collection, id, field, values).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, id).await
    }
}
