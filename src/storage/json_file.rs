//! Whole-document JSON files: read, atomic replace, remove.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::storage::errors::{StorageError, StorageResult};

/// Read and parse a JSON document.
///
/// A missing file yields `Ok(None)`.
///
/// # Errors
/// Returns `StorageError::Corrupt` if the file cannot be parsed, or an I/O
/// error if it cannot be read.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StorageError::io(path, err)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Replace `path` with the pretty-printed JSON of `value`.
///
/// The document is written to a temporary file next to the target and renamed
/// over it, so readers see either the old or the new document.
///
/// # Errors
/// Returns an error if serialization, the write, or the rename fails.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_bytes_atomic(&target, &bytes)).await?
}

fn write_bytes_atomic(target: &Path, bytes: &[u8]) -> StorageResult<()> {
    let dir = parent_dir(target);
    std::fs::create_dir_all(&dir).map_err(|err| StorageError::io(&dir, err))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|err| StorageError::io(&dir, err))?;
    if let Err(err) = tmp.write_all(bytes).and_then(|()| tmp.as_file().sync_all()) {
        return Err(StorageError::io(tmp.path(), err));
    }

    tmp.persist(target).map_err(|source| StorageError::Persist {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Delete a file; `Ok(false)` when it did not exist.
///
/// # Errors
/// Returns an I/O error for anything other than a missing file.
pub async fn remove_file(path: &Path) -> StorageResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(StorageError::io(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let doc: Option<Doc> = read_json(&dir.path().join("absent.json")).await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_write_creates_parent_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        let first = Doc {
            name: "第一".to_string(),
            count: 1,
        };
        write_json_atomic(&path, &first).await.unwrap();
        let second = Doc {
            name: "second".to_string(),
            count: 2,
        };
        write_json_atomic(&path, &second).await.unwrap();

        let loaded: Option<Doc> = read_json(&path).await.unwrap();
        assert_eq!(loaded, Some(second));

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_non_ascii_is_written_verbatim() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        let doc = Doc {
            name: "初始化消息".to_string(),
            count: 0,
        };
        write_json_atomic(&path, &doc).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("初始化消息"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = read_json::<Doc>(&path).await.unwrap_err();
        assert!(err.is_corrupt());
    }

    #[tokio::test]
    async fn test_remove_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"{}").unwrap();
        assert!(remove_file(&path).await.unwrap());
        assert!(!remove_file(&path).await.unwrap());
    }
}
