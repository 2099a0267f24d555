//! Tag persistence in `tags.json`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::common::ids::{ConversationId, TagId};
use crate::common::time;
use crate::storage::{StorageError, read_json, write_json_atomic};
use crate::tags::model::{Tag, TagList};

/// Errors raised by tag operations.
#[derive(Debug, Error)]
pub enum TagError {
    /// No tag has this id.
    #[error("tag not found: {0}")]
    NotFound(TagId),
    /// The tag text is empty after trimming.
    #[error("tag must not be empty")]
    EmptyTag,
    /// Reading or writing `tags.json` failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convenience result alias for tag operations.
pub type TagResult<T> = Result<T, TagError>;

/// All tags, read and rewritten as a whole under one async mutex.
pub struct TagStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TagStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// File holding the tags.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> TagResult<TagList> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    async fn save(&self, list: &TagList) -> TagResult<()> {
        write_json_atomic(&self.path, list).await?;
        Ok(())
    }

    /// Attach a tag to a conversation.
    pub async fn add(&self, conversation_id: ConversationId, tag: &str) -> TagResult<Tag> {
        let text = clean_tag(tag)?;
        let _guard = self.lock.lock().await;
        let mut list = self.load().await?;
        let tag = Tag::new(conversation_id, text);
        list.tags.push(tag.clone());
        self.save(&list).await?;
        info!(tag_id = %tag.id, conversation_id = %tag.conversation_id, "tag added");
        Ok(tag)
    }

    /// Remove a tag.
    pub async fn delete(&self, id: &TagId) -> TagResult<()> {
        let _guard = self.lock.lock().await;
        let mut list = self.load().await?;
        let before = list.tags.len();
        list.tags.retain(|t| &t.id != id);
        if list.tags.len() == before {
            return Err(TagError::NotFound(id.clone()));
        }
        self.save(&list).await?;
        info!(tag_id = %id, "tag deleted");
        Ok(())
    }

    /// Change a tag's text.
    pub async fn update(&self, id: &TagId, tag: &str) -> TagResult<Tag> {
        let text = clean_tag(tag)?;
        let _guard = self.lock.lock().await;
        let mut list = self.load().await?;
        let found = list
            .tags
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| TagError::NotFound(id.clone()))?;
        found.tag = text;
        found.updated_at = time::now();
        let updated = found.clone();
        self.save(&list).await?;
        info!(tag_id = %id, "tag updated");
        Ok(updated)
    }

    /// Tags of one conversation.
    pub async fn list_for(&self, conversation_id: &ConversationId) -> TagResult<TagList> {
        let mut list = self.load().await?;
        list.tags.retain(|t| &t.conversation_id == conversation_id);
        Ok(list)
    }

    /// Every tag.
    pub async fn list_all(&self) -> TagResult<TagList> {
        self.load().await
    }
}

fn clean_tag(tag: &str) -> TagResult<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(TagError::EmptyTag);
    }
    Ok(tag.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn conv(raw: &str) -> ConversationId {
        ConversationId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let dir = TempDir::new().unwrap();
        let tags = TagStore::new(dir.path().join("tags.json"));

        let work = tags.add(conv("conv-1"), " 工作 ").await.unwrap();
        assert_eq!(work.tag, "工作");
        tags.add(conv("conv-2"), "home").await.unwrap();

        let for_one = tags.list_for(&conv("conv-1")).await.unwrap();
        assert_eq!(for_one.tags, vec![work]);
        assert_eq!(tags.list_all().await.unwrap().tags.len(), 2);
        assert!(tags.list_for(&conv("other")).await.unwrap().tags.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let dir = TempDir::new().unwrap();
        let tags = TagStore::new(dir.path().join("tags.json"));
        let tag = tags.add(conv("c"), "old").await.unwrap();

        let updated = tags.update(&tag.id, "new").await.unwrap();
        assert_eq!(updated.tag, "new");
        assert_eq!(updated.created_at, tag.created_at);
        assert!(updated.updated_at >= tag.updated_at);

        tags.delete(&tag.id).await.unwrap();
        assert!(matches!(tags.delete(&tag.id).await, Err(TagError::NotFound(_))));
        assert!(matches!(
            tags.update(&tag.id, "x").await,
            Err(TagError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_tag_rejected() {
        let dir = TempDir::new().unwrap();
        let tags = TagStore::new(dir.path().join("tags.json"));
        assert!(matches!(tags.add(conv("c"), "  ").await, Err(TagError::EmptyTag)));
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let tags = TagStore::new(dir.path().join("tags.json"));
        tags.add(conv("c"), "t").await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(tags.path()).unwrap()).unwrap();
        assert_eq!(raw["tags"][0]["conversation_id"], json!("c"));
        assert_eq!(raw["tags"][0]["tag"], json!("t"));
    }
}
