//! Conversation tags, persisted in `tags.json`.

pub mod model;
pub mod store;

pub use model::{Tag, TagList};
pub use store::{TagError, TagResult, TagStore};
