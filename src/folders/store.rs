//! Folder persistence in a single JSON array file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::common::ids::{ConversationId, FolderId};
use crate::common::time;
use crate::folders::model::Folder;
use crate::storage::{StorageError, read_json, write_json_atomic};

/// Errors raised by folder operations.
#[derive(Debug, Error)]
pub enum FolderError {
    /// No folder has this id.
    #[error("folder not found: {0}")]
    NotFound(FolderId),
    /// The name is empty after trimming.
    #[error("folder name must not be empty")]
    EmptyName,
    /// Another folder already uses this name.
    #[error("folder name already exists: {0}")]
    DuplicateName(String),
    /// The default folder cannot be renamed or deleted.
    #[error("the default folder cannot be {0}")]
    DefaultImmutable(&'static str),
    /// Membership changes need a conversation id.
    #[error("conversation_id must not be empty")]
    MissingConversationId,
    /// Reading or writing `folders.json` failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convenience result alias for folder operations.
pub type FolderResult<T> = Result<T, FolderError>;

/// All folders, read and rewritten as a whole.
///
/// Mutations hold one async mutex for the full read-modify-write cycle.
pub struct FolderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FolderStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// File holding the folders.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> FolderResult<Vec<Folder>> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }

    async fn save(&self, folders: &[Folder]) -> FolderResult<()> {
        write_json_atomic(&self.path, folders).await?;
        Ok(())
    }

    /// Create the default folder unless one is already flagged as default.
    pub async fn ensure_default(&self) -> FolderResult<bool> {
        let _guard = self.lock.lock().await;
        let mut folders = self.load().await?;
        if folders.iter().any(|f| f.is_default) {
            return Ok(false);
        }
        folders.push(Folder::default_folder());
        self.save(&folders).await?;
        info!(path = %self.path.display(), "default folder created");
        Ok(true)
    }

    /// Every folder in stored order.
    pub async fn list(&self) -> FolderResult<Vec<Folder>> {
        self.load().await
    }

    /// Create a folder with a unique, non-empty name.
    pub async fn create(&self, name: &str) -> FolderResult<Folder> {
        let name = clean_name(name)?;
        let _guard = self.lock.lock().await;
        let mut folders = self.load().await?;
        if folders.iter().any(|f| f.name == name) {
            return Err(FolderError::DuplicateName(name));
        }

        let folder = Folder::new(FolderId::generate(), name);
        folders.push(folder.clone());
        self.save(&folders).await?;
        info!(folder_id = %folder.folder_id, name = %folder.name, "folder created");
        Ok(folder)
    }

    /// Rename a folder.
    pub async fn rename(&self, id: &FolderId, name: &str) -> FolderResult<Folder> {
        let name = clean_name(name)?;
        let _guard = self.lock.lock().await;
        let mut folders = self.load().await?;
        if folders.iter().any(|f| f.name == name && &f.folder_id != id) {
            return Err(FolderError::DuplicateName(name));
        }

        let folder = find_mut(&mut folders, id)?;
        if folder.is_default {
            return Err(FolderError::DefaultImmutable("renamed"));
        }
        folder.name = name;
        folder.updated_at = time::now();
        let folder = folder.clone();

        self.save(&folders).await?;
        info!(folder_id = %id, name = %folder.name, "folder renamed");
        Ok(folder)
    }

    /// Delete a non-default folder.
    pub async fn delete(&self, id: &FolderId) -> FolderResult<()> {
        let _guard = self.lock.lock().await;
        let mut folders = self.load().await?;
        let index = folders
            .iter()
            .position(|f| &f.folder_id == id)
            .ok_or_else(|| FolderError::NotFound(id.clone()))?;
        if folders[index].is_default {
            return Err(FolderError::DefaultImmutable("deleted"));
        }
        folders.remove(index);
        self.save(&folders).await?;
        info!(folder_id = %id, "folder deleted");
        Ok(())
    }

    /// Put a conversation in a folder; no-op when already there.
    pub async fn add_conversation(
        &self,
        id: &FolderId,
        conversation_id: Option<ConversationId>,
    ) -> FolderResult<Folder> {
        let conversation_id = conversation_id.ok_or(FolderError::MissingConversationId)?;
        self.update_members(id, |folder| folder.insert(&conversation_id))
            .await
    }

    /// Take a conversation out of a folder; no-op when absent.
    pub async fn remove_conversation(
        &self,
        id: &FolderId,
        conversation_id: Option<ConversationId>,
    ) -> FolderResult<Folder> {
        let conversation_id = conversation_id.ok_or(FolderError::MissingConversationId)?;
        self.update_members(id, |folder| folder.remove(&conversation_id))
            .await
    }

    /// Apply a membership change and save only if it changed something.
    async fn update_members(
        &self,
        id: &FolderId,
        change: impl FnOnce(&mut Folder) -> bool + Send,
    ) -> FolderResult<Folder> {
        let _guard = self.lock.lock().await;
        let mut folders = self.load().await?;
        let folder = find_mut(&mut folders, id)?;
        let changed = change(folder);
        let folder = folder.clone();
        if changed {
            self.save(&folders).await?;
        }
        Ok(folder)
    }
}

fn clean_name(name: &str) -> FolderResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FolderError::EmptyName);
    }
    Ok(name.to_string())
}

fn find_mut<'a>(folders: &'a mut [Folder], id: &FolderId) -> FolderResult<&'a mut Folder> {
    folders
        .iter_mut()
        .find(|f| &f.folder_id == id)
        .ok_or_else(|| FolderError::NotFound(id.clone()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store(dir: &TempDir) -> FolderStore {
        FolderStore::new(dir.path().join("folders.json"))
    }

    fn conv(raw: &str) -> Option<ConversationId> {
        Some(ConversationId::new(raw).unwrap())
    }

    #[tokio::test]
    async fn test_ensure_default_once() {
        let dir = TempDir::new().unwrap();
        let folders = store(&dir);
        assert!(folders.ensure_default().await.unwrap());
        assert!(!folders.ensure_default().await.unwrap());

        let listed = folders.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_default);
    }

    #[tokio::test]
    async fn test_create_and_rename_rules() {
        let dir = TempDir::new().unwrap();
        let folders = store(&dir);
        folders.ensure_default().await.unwrap();

        let work = folders.create("  Work ").await.unwrap();
        assert_eq!(work.name, "Work");
        assert!(matches!(
            folders.create("Work").await,
            Err(FolderError::DuplicateName(_))
        ));
        assert!(matches!(folders.create("   ").await, Err(FolderError::EmptyName)));

        let home = folders.create("Home").await.unwrap();
        assert!(matches!(
            folders.rename(&home.folder_id, "Work").await,
            Err(FolderError::DuplicateName(_))
        ));
        let same = folders.rename(&work.folder_id, "Work").await.unwrap();
        assert_eq!(same.name, "Work");
        let renamed = folders.rename(&home.folder_id, "House").await.unwrap();
        assert_eq!(renamed.name, "House");

        assert!(matches!(
            folders
                .rename(&FolderId::default_folder(), "Other")
                .await,
            Err(FolderError::DefaultImmutable(_))
        ));
        assert!(matches!(
            folders.rename(&FolderId::from("missing"), "X").await,
            Err(FolderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let dir = TempDir::new().unwrap();
        let folders = store(&dir);
        folders.ensure_default().await.unwrap();
        let work = folders.create("Work").await.unwrap();

        assert!(matches!(
            folders.delete(&FolderId::default_folder()).await,
            Err(FolderError::DefaultImmutable(_))
        ));
        folders.delete(&work.folder_id).await.unwrap();
        assert!(matches!(
            folders.delete(&work.folder_id).await,
            Err(FolderError::NotFound(_))
        ));
        assert_eq!(folders.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_membership() {
        let dir = TempDir::new().unwrap();
        let folders = store(&dir);
        let work = folders.create("Work").await.unwrap();

        folders
            .add_conversation(&work.folder_id, conv("c1"))
            .await
            .unwrap();
        let again = folders
            .add_conversation(&work.folder_id, conv("c1"))
            .await
            .unwrap();
        assert_eq!(again.conversation_ids.len(), 1);

        let removed = folders
            .remove_conversation(&work.folder_id, conv("c1"))
            .await
            .unwrap();
        assert!(removed.conversation_ids.is_empty());
        folders
            .remove_conversation(&work.folder_id, conv("c1"))
            .await
            .unwrap();

        assert!(matches!(
            folders.add_conversation(&work.folder_id, None).await,
            Err(FolderError::MissingConversationId)
        ));
        assert!(matches!(
            folders
                .add_conversation(&FolderId::from("nope"), conv("c1"))
                .await,
            Err(FolderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_members_do_not_block_startup() {
        let dir = TempDir::new().unwrap();
        let folders = store(&dir);
        std::fs::write(
            folders.path(),
            r#"[{"folder_id": "work", "name": "Work", "conversation_ids": ["旧 会话"]}]"#,
        )
        .unwrap();

        assert!(folders.ensure_default().await.unwrap());
        let work = folders
            .add_conversation(&FolderId::from("work"), conv("c1"))
            .await
            .unwrap();
        assert_eq!(work.conversation_ids, vec!["旧 会话", "c1"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let folders = store(&dir);
        std::fs::write(folders.path(), b"not json").unwrap();
        assert!(matches!(
            folders.list().await,
            Err(FolderError::Storage(StorageError::Corrupt { .. }))
        ));
    }
}
