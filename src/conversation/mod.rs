//! Conversations: on-disk records, their store, and the chat service.

pub mod model;
pub mod service;
pub mod store;

pub use model::{Conversation, ConversationConfig, DEFAULT_MODEL, InvalidModel, Message, Role};
pub use service::{
    ConfigOutcome, ConversationError, ConversationPage, ConversationResult, ConversationService,
    ConversationView, DeleteOutcome, SendOutcome,
};
pub use store::{ConversationEntry, ConversationStore, JsonConversationStore, StoreFuture};
