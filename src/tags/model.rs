//! Tag records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::ids::{ConversationId, TagId};
use crate::common::time;

/// A label attached to one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Identifier.
    pub id: TagId,
    /// Tagged conversation.
    pub conversation_id: ConversationId,
    /// Label text.
    pub tag: String,
    /// Creation time.
    #[serde(default = "time::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(default = "time::now")]
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// A new tag with a generated id.
    #[must_use]
    pub fn new(conversation_id: ConversationId, tag: impl Into<String>) -> Self {
        let now = time::now();
        Self {
            id: TagId::generate(),
            conversation_id,
            tag: tag.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// On-disk layout of `tags.json`, also the shape of list responses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList {
    /// Tags in insertion order.
    #[serde(default)]
    pub tags: Vec<Tag>,
}
