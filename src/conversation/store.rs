//! Conversation persistence: one JSON document per conversation.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, warn};

use crate::common::ids::ConversationId;
use crate::common::time;
use crate::conversation::model::Conversation;
use crate::storage::{StorageError, StorageResult, read_json, remove_file, write_json_atomic};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Listing entry: enough to sort conversations without loading messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationEntry {
    /// Conversation id.
    pub id: ConversationId,
    /// Creation time (or its best approximation).
    pub created_at: DateTime<Utc>,
}

/// Trait for conversation storage.
pub trait ConversationStore: Send + Sync {
    /// List every stored conversation, unordered.
    fn list_entries(&self) -> StoreFuture<'_, StorageResult<Vec<ConversationEntry>>>;

    /// Load a conversation; `None` when it does not exist.
    fn load<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> StoreFuture<'a, StorageResult<Option<Conversation>>>;

    /// Create or replace a conversation.
    fn save<'a>(&'a self, conversation: &'a Conversation) -> StoreFuture<'a, StorageResult<()>>;

    /// Delete a conversation; `false` when it did not exist.
    fn delete<'a>(&'a self, id: &'a ConversationId) -> StoreFuture<'a, StorageResult<bool>>;

    /// Check if a conversation exists.
    fn exists<'a>(&'a self, id: &'a ConversationId) -> StoreFuture<'a, StorageResult<bool>>;
}

/// Only the field needed for sorting; avoids materialising message lists.
#[derive(Deserialize)]
struct CreatedAtProbe {
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Directory-of-JSON-files implementation.
pub struct JsonConversationStore {
    dir: PathBuf,
}

impl JsonConversationStore {
    /// Store rooted at `dir`; the directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &ConversationId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn scan(&self) -> StorageResult<Vec<ConversationEntry>> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(&self.dir, err)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|err| StorageError::io(&self.dir, err))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(id) = ConversationId::new(stem) else {
                warn!(file = %path.display(), "skipping file with invalid conversation id");
                continue;
            };

            let created_at = created_at_of(&path, &id).await;
            entries.push(ConversationEntry { id, created_at });
        }

        Ok(entries)
    }
}

/// `created_at` from the document, else the file's timestamps, else the epoch.
async fn created_at_of(path: &Path, id: &ConversationId) -> DateTime<Utc> {
    match read_json::<CreatedAtProbe>(path).await {
        Ok(Some(CreatedAtProbe {
            created_at: Some(created_at),
        })) => created_at,
        Ok(_) => file_time(path).await.unwrap_or_else(time::epoch),
        Err(err) => {
            error!(conversation_id = %id, error = %err, "failed to read created_at");
            time::epoch()
        }
    }
}

async fn file_time(path: &Path) -> Option<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(time::from_system_time)
}

impl ConversationStore for JsonConversationStore {
    fn list_entries(&self) -> StoreFuture<'_, StorageResult<Vec<ConversationEntry>>> {
        Box::pin(self.scan())
    }

    fn load<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> StoreFuture<'a, StorageResult<Option<Conversation>>> {
        Box::pin(async move { read_json(&self.path_for(id)).await })
    }

    fn save<'a>(&'a self, conversation: &'a Conversation) -> StoreFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            write_json_atomic(&self.path_for(&conversation.conversation_id), conversation).await
        })
    }

    fn delete<'a>(&'a self, id: &'a ConversationId) -> StoreFuture<'a, StorageResult<bool>> {
        Box::pin(async move { remove_file(&self.path_for(id)).await })
    }

    fn exists<'a>(&'a self, id: &'a ConversationId) -> StoreFuture<'a, StorageResult<bool>> {
        Box::pin(async move {
            let path = self.path_for(id);
            tokio::fs::try_exists(&path)
                .await
                .map_err(|err| StorageError::io(path, err))
        })
    }
}
