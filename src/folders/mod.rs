//! Folders grouping conversations, persisted in `folders.json`.

pub mod model;
pub mod store;

pub use model::{DEFAULT_FOLDER_NAME, Folder};
pub use store::{FolderError, FolderResult, FolderStore};
