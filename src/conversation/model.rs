//! Conversation record as stored on disk.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::common::ids::ConversationId;
use crate::common::time;
use crate::llm::types::{ChatMessage, ChatRole};

/// Model used by conversations that never picked one.
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Characters of the first user message used as the default name.
const NAME_CHARS: usize = 10;

/// A config body whose `model` is present but not a non-empty string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("config model must be a non-empty string")]
pub struct InvalidModel;

/// Speaker of a stored message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Any role this service does not know; sent to the model as user input.
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Unknown => "unknown",
        }
    }

    /// Role as sent to the model.
    #[must_use]
    pub const fn to_chat_role(self) -> ChatRole {
        match self {
            Self::System => ChatRole::System,
            Self::Assistant => ChatRole::Assistant,
            Self::User | Self::Unknown => ChatRole::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker.
    pub role: Role,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Creation time.
    #[serde(default = "time::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build a message stamped with the current time.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: time::now(),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Convert to the provider-neutral form.
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role.to_chat_role(), self.content.clone())
    }
}

/// Per-conversation model settings.
///
/// Unknown keys are kept verbatim so clients can store extra parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Model (or Azure deployment) used for this conversation.
    #[serde(default = "default_model")]
    pub model: String,
    /// Additional client-defined settings.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            extra: Map::new(),
        }
    }
}

/// A conversation and its full message history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier, also the file stem.
    pub conversation_id: ConversationId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// First user message, set once.
    #[serde(default)]
    pub summary: String,
    /// Creation time.
    #[serde(default = "time::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    #[serde(default = "time::now")]
    pub updated_at: DateTime<Utc>,
    /// Messages, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Model settings.
    #[serde(default)]
    pub config: ConversationConfig,
    /// Legacy top-level copy of `config.model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Conversation {
    /// A fresh, empty conversation.
    #[must_use]
    pub fn new(conversation_id: ConversationId) -> Self {
        let now = time::now();
        Self {
            name: conversation_id.to_string(),
            conversation_id,
            summary: String::new(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            config: ConversationConfig::default(),
            model: None,
        }
    }

    /// First message written by the user, if any.
    #[must_use]
    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User && !m.content.is_empty())
    }

    /// Name derived from the first user message, else the id.
    #[must_use]
    pub fn default_name(&self) -> String {
        self.first_user_message().map_or_else(
            || self.conversation_id.to_string(),
            |m| m.content.chars().take(NAME_CHARS).collect(),
        )
    }

    /// Fill in a missing name and summary from the first user message.
    ///
    /// An existing name or summary is never replaced.
    pub fn fill_defaults(&mut self) {
        if self.summary.is_empty() {
            self.summary = self
                .first_user_message()
                .map(|m| m.content.clone())
                .unwrap_or_default();
        }
        if self.name.is_empty() || self.name == self.conversation_id.as_str() {
            self.name = self.default_name();
        }
    }

    /// Set the model in both the config and the legacy field.
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        self.model = Some(model.clone());
        self.config.model = model;
    }

    /// Replace the whole config; the legacy field follows when a model is present.
    ///
    /// # Errors
    /// Returns `InvalidModel`, leaving the conversation untouched, when
    /// `model` is not a non-empty string.
    pub fn replace_config(&mut self, raw: Map<String, Value>) -> Result<(), InvalidModel> {
        let mut extra = raw;
        let model = match extra.remove("model") {
            None => None,
            Some(Value::String(model)) if !model.trim().is_empty() => Some(model),
            Some(_) => return Err(InvalidModel),
        };
        if let Some(model) = &model {
            self.model = Some(model.clone());
        }
        self.config = ConversationConfig {
            model: model.unwrap_or_else(default_model),
            extra,
        };
        Ok(())
    }

    /// Mark as modified now.
    pub fn touch(&mut self) {
        self.updated_at = time::now();
    }

    /// History in the provider-neutral form.
    #[must_use]
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_chat_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn id(raw: &str) -> ConversationId {
        ConversationId::new(raw).unwrap()
    }

    #[test]
    fn test_new_conversation_defaults() {
        let conv = Conversation::new(id("c1"));
        assert_eq!(conv.name, "c1");
        assert_eq!(conv.summary, "");
        assert_eq!(conv.config.model, DEFAULT_MODEL);
        assert_eq!(conv.created_at, conv.updated_at);
        assert!(conv.messages.is_empty());
    }

    #[test]
    fn test_fill_defaults_from_first_user_message() {
        let mut conv = Conversation::new(id("c1"));
        conv.messages.push(Message::new(Role::System, "rules"));
        conv.messages.push(Message::user("这是一条很长的测试消息，用于生成名称"));
        conv.messages.push(Message::assistant("ok"));
        conv.fill_defaults();
        assert_eq!(conv.name, "这是一条很长的测试消");
        assert_eq!(conv.summary, "这是一条很长的测试消息，用于生成名称");

        conv.messages.push(Message::user("second"));
        conv.summary = "kept".to_string();
        conv.fill_defaults();
        assert_eq!(conv.summary, "kept");
        assert_eq!(conv.name, "这是一条很长的测试消");
    }

    #[test]
    fn test_custom_name_survives() {
        let mut conv = Conversation::new(id("c1"));
        conv.name = "Work".to_string();
        conv.messages.push(Message::user("hello there"));
        conv.fill_defaults();
        assert_eq!(conv.name, "Work");
    }

    #[test]
    fn test_unknown_role_maps_to_user() {
        let msg: Message =
            serde_json::from_value(json!({"role": "narrator", "content": "x"})).unwrap();
        assert_eq!(msg.role, Role::Unknown);
        assert_eq!(msg.to_chat_message().role, ChatRole::User);
    }

    #[test]
    fn test_config_keeps_extra_keys() {
        let mut conv = Conversation::new(id("c1"));
        let raw = json!({"model": "o4-mini", "max_tokens": 256});
        conv.replace_config(raw.as_object().cloned().unwrap()).unwrap();
        assert_eq!(conv.config.model, "o4-mini");
        assert_eq!(conv.model.as_deref(), Some("o4-mini"));

        let stored = serde_json::to_value(&conv.config).unwrap();
        assert_eq!(stored, raw);
    }

    #[test]
    fn test_config_without_model_uses_default() {
        let mut conv = Conversation::new(id("c1"));
        conv.set_model("gpt-35-turbo");
        let raw = json!({"temperature": 0.1});
        conv.replace_config(raw.as_object().cloned().unwrap()).unwrap();
        assert_eq!(conv.config.model, DEFAULT_MODEL);
        assert_eq!(conv.model.as_deref(), Some("gpt-35-turbo"));
    }

    #[test]
    fn test_config_rejects_non_string_model() {
        let mut conv = Conversation::new(id("c1"));
        conv.set_model("gpt-35-turbo");
        let before = conv.clone();

        for raw in [json!({"model": 5}), json!({"model": "  "}), json!({"model": null})] {
            let result = conv.replace_config(raw.as_object().cloned().unwrap());
            assert_eq!(result, Err(InvalidModel));
            assert_eq!(conv, before);
        }
    }

    #[test]
    fn test_minimal_file_deserializes() {
        let conv: Conversation =
            serde_json::from_value(json!({"conversation_id": "legacy"})).unwrap();
        assert_eq!(conv.conversation_id.as_str(), "legacy");
        assert_eq!(conv.config.model, DEFAULT_MODEL);
        assert!(conv.model.is_none());
    }
}
