//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::common::config::AppConfig;
use crate::conversation::{ConversationService, JsonConversationStore};
use crate::folders::FolderStore;
use crate::llm::{LlmEngine, LlmResult};
use crate::tags::TagStore;

/// Shared application state.
pub struct AppState {
    /// Loaded configuration.
    pub config: AppConfig,
    /// Conversation operations.
    pub conversations: ConversationService,
    /// Folder operations.
    pub folders: FolderStore,
    /// Tag operations.
    pub tags: TagStore,
}

impl AppState {
    /// Build the state with the LLM backend selected in `config`.
    ///
    /// # Errors
    /// Returns an error if the LLM backend cannot be created.
    pub fn new(config: AppConfig) -> LlmResult<Arc<Self>> {
        let engine = LlmEngine::from_config(&config.llm)?;
        Ok(Self::with_engine(config, engine))
    }

    /// Build the state around an existing engine.
    #[must_use]
    pub fn with_engine(config: AppConfig, engine: LlmEngine) -> Arc<Self> {
        let store = Arc::new(JsonConversationStore::new(
            config.storage.conversations_dir(),
        ));
        Arc::new(Self {
            conversations: ConversationService::new(store, engine),
            folders: FolderStore::new(config.storage.folders_file()),
            tags: TagStore::new(config.storage.tags_file()),
            config,
        })
    }
}
