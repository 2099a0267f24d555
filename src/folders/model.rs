//! Folder record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::ids::{ConversationId, FolderId};
use crate::common::time;

/// Display name of the folder created at startup.
pub const DEFAULT_FOLDER_NAME: &str = "Default";

/// A named group of conversations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Identifier.
    pub folder_id: FolderId,
    /// Unique display name.
    pub name: String,
    /// Member conversations in insertion order, without duplicates.
    ///
    /// Kept as plain strings so files holding ids this service would not
    /// issue itself still load; new members are validated on the way in.
    #[serde(default)]
    pub conversation_ids: Vec<String>,
    /// Creation time.
    #[serde(default = "time::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(default = "time::now")]
    pub updated_at: DateTime<Utc>,
    /// The default folder can be neither renamed nor deleted.
    #[serde(default)]
    pub is_default: bool,
}

impl Folder {
    /// A new, empty folder.
    #[must_use]
    pub fn new(folder_id: FolderId, name: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            folder_id,
            name: name.into(),
            conversation_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            is_default: false,
        }
    }

    /// The folder every installation starts with.
    #[must_use]
    pub fn default_folder() -> Self {
        Self {
            is_default: true,
            ..Self::new(FolderId::default_folder(), DEFAULT_FOLDER_NAME)
        }
    }

    /// Add a member; returns `false` when it was already present.
    pub fn insert(&mut self, id: &ConversationId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.conversation_ids.push(id.as_str().to_owned());
        self.updated_at = time::now();
        true
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: &ConversationId) -> bool {
        self.conversation_ids.iter().any(|c| c == id.as_str())
    }

    /// Remove a member; returns `false` when it was absent.
    pub fn remove(&mut self, id: &ConversationId) -> bool {
        let before = self.conversation_ids.len();
        self.conversation_ids.retain(|c| c != id.as_str());
        let removed = self.conversation_ids.len() != before;
        if removed {
            self.updated_at = time::now();
        }
        removed
    }
}
