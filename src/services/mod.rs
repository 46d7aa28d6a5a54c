pub mod message_service;
pub mod moderation;
pub mod profile;
pub mod read_state;
pub mod room_service;
pub mod subscription;

pub use message_service::MessageService;
pub use moderation::ModerationService;
pub use profile::{DocumentProfileProvider, ProfileProvider};
pub use read_state::{ReadStateTracker, UnreadAggregator};
pub use room_service::{canonical_pair_key, pair_index_id, RoomService};
pub use subscription::{MessageCallback, Subscription, SubscriptionManager};

/// Document-store collection holding user records (`chatIds`,
/// `blockedUsers`, profile fields).
pub(crate) const USERS_COLLECTION: &str = "users";
/// Document-store collection mapping canonical pair keys to room ids.
pub(crate) const PAIR_INDEX_COLLECTION: &str = "chatIndex";
/// Realtime-store node holding room records, keyed by room id.
pub(crate) const ROOMS_PATH: &str = "chats";
/// Realtime-store node holding message lists, keyed by room id.
pub(crate) const MESSAGES_PATH: &str = "messages";

pub(crate) fn room_path(room_id: &str) -> String {
    format!("{ROOMS_PATH}/{room_id}")
}

pub(crate) fn room_messages_path(room_id: &str) -> String {
    format!("{MESSAGES_PATH}/{room_id}")
}

pub(crate) fn message_path(room_id: &str, message_id: &str) -> String {
    format!("{MESSAGES_PATH}/{room_id}/{message_id}")
}
