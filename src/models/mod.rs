pub mod message;
pub mod room;
pub mod user;

// Re-export for convenience
pub use message::{ChatMessage, MessageKind};
pub use room::ChatRoom;
pub use user::{UserProfile, UserRecord};
