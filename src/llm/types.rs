//! Provider-neutral chat request and response types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Speaker of a chat message as understood by the providers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Instructions for the model.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
}

impl ChatRole {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the prompt history.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: ChatRole,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    /// Build a message.
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A fully resolved completion request.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    /// Model name (Azure deployment name for Azure).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Prompt history, oldest first.
    pub messages: Vec<ChatMessage>,
}

/// Token accounting reported by the provider.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u64,
    /// Sum of both.
    #[serde(default)]
    pub total_tokens: u64,
}

/// The model's answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChatCompletion {
    /// Generated text.
    pub text: String,
    /// Token usage, when the provider reports it.
    pub usage: Option<TokenUsage>,
}
