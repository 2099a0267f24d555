//! Shared configuration, identifiers and helpers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod pagination;
pub mod time;

pub use config::{
    AppConfig, AzureConfig, LlmConfig, LlmEngineKind, LogLevel, LoggingConfig, OllamaConfig,
    OpenAiConfig, ServerConfig, StorageConfig,
};
pub use errors::{ConfigError, ConfigResult};
pub use ids::{ConversationId, ConversationIdError, FolderId, TagId};
pub use pagination::{PageError, PageLimits, PageMeta, PageParams, PageQuery};
