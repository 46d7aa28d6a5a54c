use serde::{Deserialize, Serialize};

/// The slice of a user document this core reads and mutates.
///
/// User documents are owned by the profile subsystem; this crate only
/// maintains the `chatIds` back-references and the `blockedUsers` set,
/// and reads `name`/`image` through the profile collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub chat_ids: Vec<String>,
    #[serde(default)]
    pub blocked_users: Vec<String>,
}

/// Display name and avatar, as returned by the profile collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub image: Option<String>,
}
