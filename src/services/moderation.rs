use crate::error::{ChatError, ChatResult};
use crate::models::UserRecord;
use crate::services::room_service::RoomService;
use crate::services::USERS_COLLECTION;
use crate::store::DocumentStore;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Block-list mutations and the delete-then-block composite.
pub struct ModerationService {
    documents: Arc<dyn DocumentStore>,
    rooms: Arc<RoomService>,
}

impl ModerationService {
    pub fn new(documents: Arc<dyn DocumentStore>, rooms: Arc<RoomService>) -> Self {
        Self { documents, rooms }
    }

    /// Adds `blockedId` to the blocker's block list. One-directional: the
    /// blocked side's own list is untouched, and existing rooms keep
    /// working until deleted.
    pub async fn block_user(&self, blocker_id: &str, blocked_id: &str) -> ChatResult<()> {
        if blocker_id.trim().is_empty() || blocked_id.trim().is_empty() {
            return Err(ChatError::InvalidInput("empty user id".into()));
        }
        if blocker_id.to_lowercase() == blocked_id.to_lowercase() {
            return Err(ChatError::InvalidInput("cannot block yourself".into()));
        }
        self.documents
            .array_union(
                USERS_COLLECTION,
                blocker_id,
                "blockedUsers",
                vec![json!(blocked_id)],
            )
            .await?;
        info!(blocker_id, blocked_id, "blocked user");
        Ok(())
    }

    /// Removes `blockedId` from the blocker's block list. Removing an
    /// absent entry is a no-op.
    pub async fn unblock_user(&self, blocker_id: &str, blocked_id: &str) -> ChatResult<()> {
        self.documents
            .array_remove(
                USERS_COLLECTION,
                blocker_id,
                "blockedUsers",
                vec![json!(blocked_id)],
            )
            .await?;
        Ok(())
    }

    /// Whether `targetId` is on `blockerId`'s block list.
    pub async fn is_blocked(&self, blocker_id: &str, target_id: &str) -> ChatResult<bool> {
        let record = match self.documents.get(USERS_COLLECTION, blocker_id).await? {
            Some(doc) => serde_json::from_value::<UserRecord>(doc)?,
            None => return Ok(false),
        };
        Ok(record.blocked_users.iter().any(|id| id == target_id))
    }

    /// Sequential composite: delete the room, then block the target. A
    /// missing room short-circuits to `false` with no block written. If
    /// the block fails after the deletion succeeded, the room stays gone;
    /// the error names both steps rather than rolling anything back.
    pub async fn delete_room_and_block(
        &self,
        room_id: &str,
        current_user_id: &str,
        target_user_id: &str,
    ) -> ChatResult<bool> {
        if !self.rooms.delete_room(room_id, current_user_id).await? {
            return Ok(false);
        }
        self.block_user(current_user_id, target_user_id)
            .await
            .map_err(|e| ChatError::PartialFailure {
                completed_step: "delete_room",
                failed_step: "block_user",
                source: Box::new(e),
            })?;
        Ok(true)
    }
}
