//! JSON file persistence shared by conversations, folders and tags.

pub mod errors;
pub mod json_file;

pub use errors::{StorageError, StorageResult};
pub use json_file::{read_json, remove_file, write_json_atomic};
