//! Backend-agnostic chat engine.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::common::config::{LlmConfig, LlmEngineKind};
use crate::llm::error::LlmResult;
use crate::llm::ollama::OllamaChat;
use crate::llm::openai::OpenAiChat;
use crate::llm::types::{ChatCompletion, ChatMessage, ChatRequest};

/// Boxed future type for chat model calls.
pub type LlmFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A hosted model able to answer a chat history.
pub trait ChatModel: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Produce the next assistant message.
    ///
    /// # Errors
    /// Returns an error if the provider call fails or yields no text.
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> LlmFuture<'a, LlmResult<ChatCompletion>>;
}

/// Temperature forced for reasoning models, which reject anything else.
const REASONING_TEMPERATURE: f64 = 1.0;

/// Entry point used by the conversation service.
#[derive(Clone)]
pub struct LlmEngine {
    model: Arc<dyn ChatModel>,
    default_model: String,
    temperature: f64,
}

impl LlmEngine {
    /// Wrap an arbitrary chat model.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, default_model: impl Into<String>, temperature: f64) -> Self {
        Self {
            model,
            default_model: default_model.into(),
            temperature,
        }
    }

    /// Build the backend selected in the configuration.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be constructed.
    pub fn from_config(config: &LlmConfig) -> LlmResult<Self> {
        let model: Arc<dyn ChatModel> = match config.engine {
            LlmEngineKind::Azure => Arc::new(OpenAiChat::azure(config)?),
            LlmEngineKind::OpenAi => Arc::new(OpenAiChat::openai(config)?),
            LlmEngineKind::Ollama => Arc::new(OllamaChat::new(&config.ollama)?),
        };
        Ok(Self::new(model, config.default_model.clone(), config.temperature))
    }

    /// Model used when neither the request nor the conversation names one.
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Ask the model for the next reply to `messages`.
    ///
    /// # Errors
    /// Returns an error if the backend call fails.
    pub async fn chat(&self, messages: Vec<ChatMessage>, model: Option<&str>) -> LlmResult<String> {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str());
        let request = ChatRequest {
            model: model.to_string(),
            temperature: effective_temperature(model, self.temperature),
            messages,
        };

        debug!(
            backend = self.model.backend(),
            model = %request.model,
            temperature = request.temperature,
            messages = request.messages.len(),
            "llm call started"
        );
        let started = Instant::now();
        let completion = self.model.complete(&request).await?;
        let elapsed_ms = started.elapsed().as_millis();

        match completion.usage {
            Some(usage) => info!(
                backend = self.model.backend(),
                model = %request.model,
                elapsed_ms,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "llm call finished"
            ),
            None => info!(
                backend = self.model.backend(),
                model = %request.model,
                elapsed_ms,
                "llm call finished"
            ),
        }

        Ok(completion.text)
    }
}

/// Reasoning models (`o1`, `o3-mini`, `o4-mini`, ...) only accept a temperature of 1.
#[must_use]
pub fn effective_temperature(model: &str, requested: f64) -> f64 {
    if model.starts_with('o') {
        REASONING_TEMPERATURE
    } else {
        requested
    }
}
