use crate::error::{ChatError, ChatResult, StoreError};
use crate::models::{ChatRoom, MessageKind, UserRecord};
use crate::services::message_service::MessageService;
use crate::services::profile::ProfileProvider;
use crate::services::{
    room_messages_path, room_path, PAIR_INDEX_COLLECTION, ROOMS_PATH, USERS_COLLECTION,
};
use crate::store::{server_timestamp, DocumentStore, RealtimeStore};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Sorts two participant ids into canonical order: by Unicode-lowercased
/// code-point comparison, tie-broken by the original strings. Original
/// casing is preserved in the result. Deterministic across machines:
/// a uniqueness key must not vary by locale.
pub fn canonical_pair_key(id_a: &str, id_b: &str) -> (String, String) {
    let folded_a = id_a.to_lowercase();
    let folded_b = id_b.to_lowercase();
    match folded_a.cmp(&folded_b).then_with(|| id_a.cmp(id_b)) {
        Ordering::Greater => (id_b.to_owned(), id_a.to_owned()),
        _ => (id_a.to_owned(), id_b.to_owned()),
    }
}

/// The pair-index document id for a canonical pair: `low::high`,
/// lowercased, so case-only id variants map to one index entry.
pub fn pair_index_id(low: &str, high: &str) -> String {
    format!("{}::{}", low.to_lowercase(), high.to_lowercase())
}

/// What a reference-repair pass found and fixed for one user.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `chatIds` entries whose room no longer exists.
    pub dangling_removed: usize,
    /// Rooms listing the user that were missing from `chatIds`.
    pub references_added: usize,
    /// Pair-index entries rebuilt from the room scan.
    pub indexes_rebuilt: usize,
}

/// Creates, reads, and deletes rooms; keeps the `chatIds` back-references
/// and the pair index in step with the room records.
pub struct RoomService {
    realtime: Arc<dyn RealtimeStore>,
    documents: Arc<dyn DocumentStore>,
    profiles: Arc<dyn ProfileProvider>,
    messages: MessageService,
}

impl RoomService {
    pub fn new(
        realtime: Arc<dyn RealtimeStore>,
        documents: Arc<dyn DocumentStore>,
        profiles: Arc<dyn ProfileProvider>,
        messages: MessageService,
    ) -> Self {
        Self {
            realtime,
            documents,
            profiles,
            messages,
        }
    }

    /// Scans every stored two-party room for one whose canonically sorted
    /// participants equal the canonically sorted caller pair. O(total
    /// rooms); the pair index is the fast path layered above this, but the
    /// scan stays the ground truth and is what reconciliation rebuilds
    /// lost index entries from.
    pub async fn find_existing_room(&self, id_a: &str, id_b: &str) -> ChatResult<Option<String>> {
        let target = canonical_pair_key(id_a, id_b);
        let rooms = match self.realtime.get(ROOMS_PATH).await? {
            Some(value) => value,
            None => return Ok(None),
        };
        let rooms = match rooms.as_object() {
            Some(map) => map,
            None => return Ok(None),
        };
        for (room_id, value) in rooms {
            let participants: Vec<String> = match value
                .get("participants")
                .and_then(|p| serde_json::from_value(p.clone()).ok())
            {
                Some(participants) => participants,
                None => continue,
            };
            if participants.len() != 2 {
                continue;
            }
            if canonical_pair_key(&participants[0], &participants[1]) == target {
                return Ok(Some(room_id.clone()));
            }
        }
        Ok(None)
    }

    /// Finds the room for the unordered pair (idA, idB), creating it if
    /// none exists. Idempotent: calling from either side, with any id
    /// casing, converges on one room id. On an existing room the only
    /// side-effect is a participant-image refresh.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_or_get_room(
        &self,
        id_a: &str,
        id_b: &str,
        name_a: &str,
        name_b: &str,
        image_a: Option<&str>,
        image_b: Option<&str>,
    ) -> ChatResult<String> {
        validate_pair(id_a, id_b)?;
        let (low, high) = canonical_pair_key(id_a, id_b);
        let index_id = pair_index_id(&low, &high);

        // Fast path: the pair index points straight at the room.
        if let Some(index) = self.documents.get(PAIR_INDEX_COLLECTION, &index_id).await? {
            if let Some(room_id) = index.get("roomId").and_then(|v| v.as_str()) {
                if let Some(room) = self.get_room(room_id).await? {
                    self.refresh_participant_images(&room).await;
                    return Ok(room_id.to_owned());
                }
                // Stale entry: the room is gone but its index survived.
                warn!(room_id, %index_id, "dropping pair-index entry for missing room");
                self.documents.delete(PAIR_INDEX_COLLECTION, &index_id).await?;
            }
        }

        // Legacy path: rooms created before the index get theirs backfilled.
        if let Some(room_id) = self.find_existing_room(id_a, id_b).await? {
            self.claim_pair_index(&index_id, &room_id).await?;
            if let Some(room) = self.get_room(&room_id).await? {
                self.refresh_participant_images(&room).await;
            }
            return Ok(room_id);
        }

        let room_id = self.realtime.push_key(ROOMS_PATH).await?;
        let mut names = HashMap::new();
        names.insert(id_a.to_owned(), name_a.to_owned());
        names.insert(id_b.to_owned(), name_b.to_owned());
        let mut images = HashMap::new();
        if let Some(image) = image_a {
            images.insert(id_a.to_owned(), image.to_owned());
        }
        if let Some(image) = image_b {
            images.insert(id_b.to_owned(), image.to_owned());
        }
        self.realtime
            .set(
                &room_path(&room_id),
                json!({
                    "participants": [&low, &high],
                    "participantNames": names,
                    "participantImages": images,
                    "lastMessage": "",
                    "lastMessageTime": 0,
                    "createdAt": server_timestamp(),
                    "updatedAt": server_timestamp(),
                }),
            )
            .await?;

        // Claim the pair index with a conditional create. Losing the claim
        // means the other side won a concurrent creation: remove our
        // provisional room record and adopt the winner's.
        match self
            .documents
            .create(PAIR_INDEX_COLLECTION, &index_id, json!({ "roomId": &room_id }))
            .await
        {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                let winner = self
                    .documents
                    .get(PAIR_INDEX_COLLECTION, &index_id)
                    .await?
                    .and_then(|index| {
                        index
                            .get("roomId")
                            .and_then(|v| v.as_str())
                            .map(str::to_owned)
                    })
                    .ok_or_else(|| {
                        ChatError::Store(StoreError::Backend(
                            "pair index claimed by a racing creator, then vanished".into(),
                        ))
                    })?;
                // A racing caller may have found our provisional record in
                // the scan and backfilled the index with it, in which case
                // our room is the winner and setup continues below.
                if winner != room_id {
                    self.realtime.remove(&room_path(&room_id)).await?;
                    info!(
                        room_id = %winner,
                        %index_id,
                        "lost room-creation race, adopting existing room"
                    );
                    return Ok(winner);
                }
            }
            Err(e) => return Err(e.into()),
        }

        for user_id in [id_a, id_b] {
            self.documents
                .array_union(USERS_COLLECTION, user_id, "chatIds", vec![json!(&room_id)])
                .await?;
        }

        self.messages
            .send(
                &room_id,
                id_a,
                name_a,
                &format!("{name_a} and {name_b} started a conversation"),
                MessageKind::System,
            )
            .await?;

        info!(%room_id, %low, %high, "created chat room");
        Ok(room_id)
    }

    /// Direct read. `None` on a missing id, not an error.
    pub async fn get_room(&self, room_id: &str) -> ChatResult<Option<ChatRoom>> {
        let value = match self.realtime.get(&room_path(room_id)).await? {
            Some(value) => value,
            None => return Ok(None),
        };
        let mut room: ChatRoom = serde_json::from_value(value)?;
        room.id = room_id.to_owned();
        Ok(Some(room))
    }

    /// The user's rooms, most recent activity first. Dangling `chatIds`
    /// entries are skipped and logged; the chat-list screen must render
    /// whatever resolves, never fail outright.
    pub async fn list_rooms(&self, user_id: &str) -> ChatResult<Vec<ChatRoom>> {
        let record = self.user_record(user_id).await?;
        let mut rooms = Vec::with_capacity(record.chat_ids.len());
        for chat_id in &record.chat_ids {
            match self.get_room(chat_id).await {
                Ok(Some(room)) => rooms.push(room),
                Ok(None) => {
                    warn!(user_id, room_id = %chat_id, "skipping dangling chat reference");
                }
                Err(e) => {
                    warn!(user_id, room_id = %chat_id, error = %e, "skipping unreadable room");
                }
            }
        }
        rooms.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(rooms)
    }

    /// Deletes a room, its messages, both participants' back-references,
    /// and the pair-index entry. Returns `false` (no writes) when the room
    /// does not exist. Message purge and room removal propagate failures;
    /// the reference and index cleanup past that point is best-effort, and
    /// `reconcile_user` repairs what a partial failure leaves behind.
    pub async fn delete_room(&self, room_id: &str, requesting_user_id: &str) -> ChatResult<bool> {
        let room = match self.get_room(room_id).await? {
            Some(room) => room,
            None => return Ok(false),
        };

        self.realtime.remove(&room_messages_path(room_id)).await?;
        self.realtime.remove(&room_path(room_id)).await?;

        for participant in &room.participants {
            if let Err(e) = self
                .documents
                .array_remove(USERS_COLLECTION, participant, "chatIds", vec![json!(room_id)])
                .await
            {
                warn!(room_id, user_id = %participant, error = %e, "chat reference cleanup failed");
            }
        }

        if room.participants.len() == 2 {
            let (low, high) = canonical_pair_key(&room.participants[0], &room.participants[1]);
            let index_id = pair_index_id(&low, &high);
            if let Err(e) = self.documents.delete(PAIR_INDEX_COLLECTION, &index_id).await {
                warn!(room_id, %index_id, error = %e, "pair-index cleanup failed");
            }
        }

        info!(room_id, requesting_user_id, "deleted chat room");
        Ok(true)
    }

    /// Repairs mirrored-state drift for one user: drops `chatIds` entries
    /// whose room is gone, re-adds references for rooms that list the user
    /// as a participant, and rebuilds missing pair-index entries.
    pub async fn reconcile_user(&self, user_id: &str) -> ChatResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let record = self.user_record(user_id).await?;

        for chat_id in &record.chat_ids {
            if self.get_room(chat_id).await?.is_none() {
                self.documents
                    .array_remove(USERS_COLLECTION, user_id, "chatIds", vec![json!(chat_id)])
                    .await?;
                report.dangling_removed += 1;
                info!(user_id, room_id = %chat_id, "removed dangling chat reference");
            }
        }

        let rooms = self.realtime.get(ROOMS_PATH).await?;
        let rooms = rooms.as_ref().and_then(|value| value.as_object());
        if let Some(rooms) = rooms {
            for (room_id, value) in rooms {
                let participants: Vec<String> = match value
                    .get("participants")
                    .and_then(|p| serde_json::from_value(p.clone()).ok())
                {
                    Some(participants) => participants,
                    None => continue,
                };
                if participants.len() != 2 || !participants.iter().any(|p| p == user_id) {
                    continue;
                }
                if !record.chat_ids.iter().any(|id| id == room_id) {
                    self.documents
                        .array_union(USERS_COLLECTION, user_id, "chatIds", vec![json!(room_id)])
                        .await?;
                    report.references_added += 1;
                    info!(user_id, %room_id, "restored missing chat reference");
                }
                let (low, high) = canonical_pair_key(&participants[0], &participants[1]);
                let index_id = pair_index_id(&low, &high);
                if self.documents.get(PAIR_INDEX_COLLECTION, &index_id).await?.is_none() {
                    self.claim_pair_index(&index_id, room_id).await?;
                    report.indexes_rebuilt += 1;
                    info!(%room_id, %index_id, "rebuilt pair-index entry");
                }
            }
        }

        Ok(report)
    }

    /// Recomputes `lastMessage`/`lastMessageTime` from the newest stored
    /// message and rewrites the summary if it drifted (e.g. a crash
    /// between the two send writes). Returns whether a rewrite happened.
    pub async fn reconcile_room_summary(&self, room_id: &str) -> ChatResult<bool> {
        let room = match self.get_room(room_id).await? {
            Some(room) => room,
            None => return Ok(false),
        };
        let newest = self.messages.messages(room_id, Some(1)).await?.pop();
        let (expected_text, expected_time) = match &newest {
            Some(message) => (message.message.clone(), message.timestamp),
            None => (String::new(), 0),
        };
        if room.last_message == expected_text && room.last_message_time == expected_time {
            return Ok(false);
        }
        self.realtime
            .update(
                &room_path(room_id),
                json!({
                    "lastMessage": expected_text,
                    "lastMessageTime": expected_time,
                    "updatedAt": server_timestamp(),
                }),
            )
            .await?;
        info!(room_id, "repaired drifted room summary");
        Ok(true)
    }

    /// Re-fetches both participants' avatars from the profile collaborator
    /// and writes them onto the room. Lookup failures are logged and
    /// swallowed; room resolution must not fail because a profile lookup
    /// did.
    async fn refresh_participant_images(&self, room: &ChatRoom) {
        let mut images = room.participant_images.clone();
        let mut changed = false;
        for participant in &room.participants {
            match self.profiles.profile(participant).await {
                Ok(Some(profile)) => {
                    if let Some(image) = profile.image {
                        if images.get(participant) != Some(&image) {
                            images.insert(participant.clone(), image);
                            changed = true;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        room_id = %room.id,
                        user_id = %participant,
                        error = %e,
                        "avatar refresh lookup failed"
                    );
                }
            }
        }
        if !changed {
            return;
        }
        let update = json!({
            "participantImages": images,
            "updatedAt": server_timestamp(),
        });
        if let Err(e) = self.realtime.update(&room_path(&room.id), update).await {
            warn!(room_id = %room.id, error = %e, "avatar refresh write failed");
        }
    }

    async fn claim_pair_index(&self, index_id: &str, room_id: &str) -> ChatResult<()> {
        match self
            .documents
            .create(PAIR_INDEX_COLLECTION, index_id, json!({ "roomId": room_id }))
            .await
        {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn user_record(&self, user_id: &str) -> ChatResult<UserRecord> {
        match self.documents.get(USERS_COLLECTION, user_id).await? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(UserRecord::default()),
        }
    }
}

fn validate_pair(id_a: &str, id_b: &str) -> ChatResult<()> {
    if id_a.trim().is_empty() || id_b.trim().is_empty() {
        return Err(ChatError::InvalidInput("empty participant id".into()));
    }
    if id_a.to_lowercase() == id_b.to_lowercase() {
        return Err(ChatError::InvalidInput(
            "a chat room needs two distinct participants".into(),
        ));
    }
    Ok(())
}
