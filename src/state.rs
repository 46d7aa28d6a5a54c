use crate::config::ChatConfig;
use crate::services::{
    DocumentProfileProvider, MessageService, ModerationService, ProfileProvider, ReadStateTracker,
    RoomService, SubscriptionManager, UnreadAggregator,
};
use crate::store::{DocumentStore, RealtimeStore};
use std::sync::Arc;

/// Wired-up chat core: every service sharing one pair of storage
/// collaborators. Embedders construct this once and hand it to UI
/// callers; it is cheap to clone.
#[derive(Clone)]
pub struct ChatCore {
    pub config: ChatConfig,
    pub rooms: Arc<RoomService>,
    pub messages: MessageService,
    pub subscriptions: SubscriptionManager,
    pub read_state: ReadStateTracker,
    pub moderation: Arc<ModerationService>,
    documents: Arc<dyn DocumentStore>,
}

impl ChatCore {
    /// Wires the services over the given stores, with a document-backed
    /// profile provider (bounded cache per `config`).
    pub fn new(
        realtime: Arc<dyn RealtimeStore>,
        documents: Arc<dyn DocumentStore>,
        config: ChatConfig,
    ) -> Self {
        let profiles: Arc<dyn ProfileProvider> =
            Arc::new(DocumentProfileProvider::new(Arc::clone(&documents), &config));
        Self::with_profile_provider(realtime, documents, profiles, config)
    }

    /// Same wiring with a caller-supplied profile collaborator.
    pub fn with_profile_provider(
        realtime: Arc<dyn RealtimeStore>,
        documents: Arc<dyn DocumentStore>,
        profiles: Arc<dyn ProfileProvider>,
        config: ChatConfig,
    ) -> Self {
        let messages = MessageService::new(Arc::clone(&realtime), config.clone());
        let subscriptions = SubscriptionManager::new(Arc::clone(&realtime), config.clone());
        let read_state = ReadStateTracker::new(Arc::clone(&realtime), Arc::clone(&documents));
        let rooms = Arc::new(RoomService::new(
            Arc::clone(&realtime),
            Arc::clone(&documents),
            profiles,
            messages.clone(),
        ));
        let moderation = Arc::new(ModerationService::new(
            Arc::clone(&documents),
            Arc::clone(&rooms),
        ));
        Self {
            config,
            rooms,
            messages,
            subscriptions,
            read_state,
            moderation,
            documents,
        }
    }

    /// A fresh badge aggregator for one user; call `sync_rooms` on it
    /// before reading `total`.
    pub fn unread_aggregator(&self, user_id: &str) -> UnreadAggregator {
        UnreadAggregator::new(
            user_id,
            Arc::clone(&self.documents),
            self.subscriptions.clone(),
        )
    }
}
