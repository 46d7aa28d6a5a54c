//! Direct-message core for the Wander travel social app.
//!
//! Implements the chat subsystem (order-independent room identity,
//! message storage with denormalized room summaries, live message
//! subscriptions, read receipts and unread badges, and moderation
//! composites) over two abstract storage collaborators: a document store
//! and a realtime keyed-tree store. In-memory reference backends for both
//! ship in [`store`]; hosted backends plug in through the same traits.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wander_chat::{ChatConfig, ChatCore, MemoryDocumentStore, MemoryRealtimeStore};
//!
//! # async fn demo() -> wander_chat::ChatResult<()> {
//! let core = ChatCore::new(
//!     Arc::new(MemoryRealtimeStore::new()),
//!     Arc::new(MemoryDocumentStore::new()),
//!     ChatConfig::from_env(),
//! );
//! let room_id = core
//!     .rooms
//!     .create_or_get_room("alice", "Bob99", "Alice", "Bob", None, None)
//!     .await?;
//! core.messages
//!     .send(&room_id, "alice", "Alice", "hi", wander_chat::MessageKind::Text)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

pub use config::ChatConfig;
pub use error::{ChatError, ChatResult, StoreError};
pub use models::{ChatMessage, ChatRoom, MessageKind, UserProfile, UserRecord};
pub use services::{
    canonical_pair_key, pair_index_id, DocumentProfileProvider, MessageService, ModerationService,
    ProfileProvider, ReadStateTracker, RoomService, Subscription, SubscriptionManager,
    UnreadAggregator,
};
pub use state::ChatCore;
pub use store::{
    DocumentStore, MemoryDocumentStore, MemoryRealtimeStore, RealtimeStore,
};
