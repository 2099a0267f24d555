//! Chat completions through an Ollama server using Rig.

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use rig::providers::ollama;

use crate::common::config::OllamaConfig;
use crate::llm::engine::{ChatModel, LlmFuture};
use crate::llm::error::{LlmError, LlmResult};
use crate::llm::types::{ChatCompletion, ChatMessage, ChatRequest, ChatRole, TokenUsage};

/// Ollama-backed chat model.
pub struct OllamaChat {
    client: ollama::Client<ReqwestClient>,
}

impl OllamaChat {
    /// Create a client for the configured (or default local) Ollama server.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &OllamaConfig) -> LlmResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(LlmError::from)?;
        Ok(Self { client })
    }

    async fn run(&self, request: &ChatRequest) -> LlmResult<ChatCompletion> {
        let split = split_history(&request.messages)?;
        let model = self.client.completion_model(request.model.clone());

        let history: Vec<Message> = split.history.iter().map(to_rig_message).collect();
        let builder = model
            .completion_request(split.prompt)
            .messages(history)
            .temperature(request.temperature);
        let builder = match split.preamble {
            Some(preamble) => builder.preamble(preamble),
            None => builder,
        };

        let response = model.completion(builder.build()).await?;
        let text = extract_text(&response.choice);
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(ChatCompletion {
            text,
            usage: to_token_usage(&response.usage),
        })
    }
}

impl ChatModel for OllamaChat {
    fn backend(&self) -> &'static str {
        "ollama"
    }

    fn complete<'a>(&'a self, request: &'a ChatRequest) -> LlmFuture<'a, LlmResult<ChatCompletion>> {
        Box::pin(self.run(request))
    }
}

/// A chat history rearranged the way Rig builds requests.
#[derive(Debug, PartialEq, Eq)]
struct SplitHistory<'a> {
    preamble: Option<String>,
    history: Vec<&'a ChatMessage>,
    prompt: String,
}

/// System messages become the preamble, the final turn the prompt, and
/// everything between the chat history.
fn split_history(messages: &[ChatMessage]) -> LlmResult<SplitHistory<'_>> {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == ChatRole::System)
        .map(|m| m.content.as_str())
        .collect();
    let mut turns: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.role != ChatRole::System)
        .collect();
    let prompt = turns
        .pop()
        .ok_or_else(|| LlmError::Config("chat request has no user turn".to_string()))?;

    Ok(SplitHistory {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history: turns,
        prompt: prompt.content.clone(),
    })
}

fn to_rig_message(message: &&ChatMessage) -> Message {
    match message.role {
        ChatRole::Assistant => Message::assistant(message.content.clone()),
        ChatRole::User | ChatRole::System => Message::user(message.content.clone()),
    }
}

/// `None` when the server reported no token counts at all.
fn to_token_usage(usage: &rig::completion::Usage) -> Option<TokenUsage> {
    let usage = TokenUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
    };
    (usage != TokenUsage::default()).then_some(usage)
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_history() {
        let messages = vec![
            ChatMessage::new(ChatRole::System, "be brief"),
            ChatMessage::new(ChatRole::User, "hi"),
            ChatMessage::new(ChatRole::Assistant, "hello"),
            ChatMessage::new(ChatRole::User, "how are you"),
        ];
        let split = split_history(&messages).unwrap();
        assert_eq!(split.preamble.as_deref(), Some("be brief"));
        assert_eq!(split.history.len(), 2);
        assert_eq!(split.history[1].role, ChatRole::Assistant);
        assert_eq!(split.prompt, "how are you");
    }

    #[test]
    fn test_split_history_requires_a_turn() {
        let messages = vec![ChatMessage::new(ChatRole::System, "only system")];
        assert!(matches!(split_history(&messages), Err(LlmError::Config(_))));
    }

    #[test]
    fn test_backend_name() {
        let chat = OllamaChat::new(&OllamaConfig::default()).unwrap();
        assert_eq!(chat.backend(), "ollama");
    }

    #[test]
    fn test_usage_mapping() {
        let mut usage = rig::completion::Usage::new();
        assert_eq!(to_token_usage(&usage), None);

        usage.input_tokens = 12;
        usage.output_tokens = 5;
        usage.total_tokens = 17;
        assert_eq!(
            to_token_usage(&usage),
            Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 5,
                total_tokens: 17,
            })
        );
    }
}
