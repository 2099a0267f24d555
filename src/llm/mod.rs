//! LLM backends.
//!
//! - `engine`: the `ChatModel` seam and the `LlmEngine` used by the service
//! - `openai`: Azure OpenAI and OpenAI chat completions over REST
//! - `ollama`: Ollama chat completions through Rig

pub mod engine;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod types;

pub use engine::{ChatModel, LlmEngine, LlmFuture, effective_temperature};
pub use error::{LlmError, LlmResult};
pub use ollama::OllamaChat;
pub use openai::OpenAiChat;
pub use types::{ChatCompletion, ChatMessage, ChatRequest, ChatRole, TokenUsage};
