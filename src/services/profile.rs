use crate::config::ChatConfig;
use crate::error::ChatResult;
use crate::models::{UserProfile, UserRecord};
use crate::services::USERS_COLLECTION;
use crate::store::DocumentStore;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;

/// Resolves a user id to display name and avatar URL. Used only to
/// populate denormalized room fields at creation/refresh time.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// `None` when the user is unknown to the profile subsystem.
    async fn profile(&self, user_id: &str) -> ChatResult<Option<UserProfile>>;
}

/// Document-store-backed profile lookup with an explicit bounded
/// read-through cache (capacity + TTL). Misses are not cached, so a user
/// created after a failed lookup becomes visible on the next call.
pub struct DocumentProfileProvider {
    documents: Arc<dyn DocumentStore>,
    cache: Cache<String, UserProfile>,
}

impl DocumentProfileProvider {
    pub fn new(documents: Arc<dyn DocumentStore>, config: &ChatConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.profile_cache_capacity as u64)
            .time_to_live(config.profile_cache_ttl)
            .build();
        Self { documents, cache }
    }
}

#[async_trait]
impl ProfileProvider for DocumentProfileProvider {
    async fn profile(&self, user_id: &str) -> ChatResult<Option<UserProfile>> {
        if let Some(cached) = self.cache.get(user_id).await {
            return Ok(Some(cached));
        }
        let doc = match self.documents.get(USERS_COLLECTION, user_id).await? {
            Some(doc) => doc,
            None => return Ok(None),
        };
        let record: UserRecord = serde_json::from_value(doc)?;
        let profile = UserProfile {
            name: record.name,
            image: record.image,
        };
        self.cache
            .insert(user_id.to_owned(), profile.clone())
            .await;
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn provider(documents: Arc<MemoryDocumentStore>) -> DocumentProfileProvider {
        DocumentProfileProvider::new(documents, &ChatConfig::default())
    }

    #[tokio::test]
    async fn resolves_profile_fields() {
        let documents = Arc::new(MemoryDocumentStore::new());
        documents
            .set(
                "users",
                "alice",
                json!({"name": "Alice", "image": "https://cdn/a.jpg"}),
            )
            .await
            .unwrap();

        let found = provider(Arc::clone(&documents))
            .profile("alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "Alice");
        assert_eq!(found.image.as_deref(), Some("https://cdn/a.jpg"));
    }

    #[tokio::test]
    async fn unknown_user_is_none_and_not_cached() {
        let documents = Arc::new(MemoryDocumentStore::new());
        let lookup = provider(Arc::clone(&documents));
        assert!(lookup.profile("ghost").await.unwrap().is_none());

        documents
            .set("users", "ghost", json!({"name": "Ghost"}))
            .await
            .unwrap();
        let found = lookup.profile("ghost").await.unwrap().unwrap();
        assert_eq!(found.name, "Ghost");
    }

    #[tokio::test]
    async fn hit_is_served_from_cache() {
        let documents = Arc::new(MemoryDocumentStore::new());
        documents
            .set("users", "alice", json!({"name": "Alice"}))
            .await
            .unwrap();
        let lookup = provider(Arc::clone(&documents));
        assert_eq!(lookup.profile("alice").await.unwrap().unwrap().name, "Alice");

        // A write behind the cache's back is not observed within the TTL.
        documents
            .set("users", "alice", json!({"name": "Renamed"}))
            .await
            .unwrap();
        assert_eq!(lookup.profile("alice").await.unwrap().unwrap().name, "Alice");
    }
}
