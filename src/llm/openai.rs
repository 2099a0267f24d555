//! Chat completions over the OpenAI REST protocol, for Azure deployments or
//! the public API.
//!
//! Azure:  `POST {endpoint}/openai/deployments/{model}/chat/completions?api-version=…`
//! with an `api-key` header.
//! OpenAI: `POST {base_url}/chat/completions` with a bearer token and `model`
//! in the body.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::common::config::LlmConfig;
use crate::llm::engine::{ChatModel, LlmFuture};
use crate::llm::error::{LlmError, LlmResult};
use crate::llm::types::{ChatCompletion, ChatMessage, ChatRequest, TokenUsage};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error bodies are cut to this many characters before logging/returning.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// How requests are addressed and authenticated.
#[derive(Clone, Debug)]
enum Flavor {
    Azure {
        endpoint: Url,
        api_key: String,
        api_version: String,
    },
    OpenAi {
        base_url: Url,
        api_key: String,
    },
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f64,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Async client for OpenAI-protocol chat completions.
pub struct OpenAiChat {
    client: Client,
    flavor: Flavor,
}

impl OpenAiChat {
    /// Client for Azure OpenAI deployments.
    ///
    /// # Errors
    /// Returns an error if credentials are missing or the HTTP client cannot be built.
    pub fn azure(config: &LlmConfig) -> LlmResult<Self> {
        let endpoint = config
            .azure
            .endpoint
            .as_deref()
            .ok_or_else(|| LlmError::Config("AZURE_OPENAI_ENDPOINT is not set".to_string()))?;
        let api_key = config
            .azure
            .api_key
            .clone()
            .ok_or_else(|| LlmError::Config("AZURE_OPENAI_API_KEY is not set".to_string()))?;
        let api_version = config
            .azure
            .api_version
            .clone()
            .ok_or_else(|| LlmError::Config("AZURE_OPENAI_API_VERSION is not set".to_string()))?;

        let flavor = Flavor::Azure {
            endpoint: Url::parse(endpoint)?,
            api_key,
            api_version,
        };
        Self::with_flavor(flavor, config.request_timeout)
    }

    /// Client for the OpenAI API (or a compatible gateway).
    ///
    /// # Errors
    /// Returns an error if the key is missing or the HTTP client cannot be built.
    pub fn openai(config: &LlmConfig) -> LlmResult<Self> {
        let api_key = config
            .openai
            .api_key
            .clone()
            .ok_or_else(|| LlmError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let flavor = Flavor::OpenAi {
            base_url: Url::parse(&config.openai.base_url)?,
            api_key,
        };
        Self::with_flavor(flavor, config.request_timeout)
    }

    fn with_flavor(flavor: Flavor, timeout: Duration) -> LlmResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, flavor })
    }

    /// Endpoint for a completion against `model`.
    ///
    /// # Errors
    /// Returns an error if the resulting URL is invalid.
    pub fn completions_url(&self, model: &str) -> LlmResult<Url> {
        match &self.flavor {
            Flavor::Azure {
                endpoint,
                api_version,
                ..
            } => {
                let base = endpoint.as_str().trim_end_matches('/');
                let mut url = Url::parse(&format!(
                    "{base}/openai/deployments/{model}/chat/completions"
                ))?;
                url.query_pairs_mut().append_pair("api-version", api_version);
                Ok(url)
            }
            Flavor::OpenAi { base_url, .. } => {
                let base = base_url.as_str().trim_end_matches('/');
                Ok(Url::parse(&format!("{base}/chat/completions"))?)
            }
        }
    }

    async fn post_completion(&self, request: &ChatRequest) -> LlmResult<ChatCompletion> {
        let url = self.completions_url(&request.model)?;
        let body = CompletionBody {
            model: match self.flavor {
                Flavor::Azure { .. } => None,
                Flavor::OpenAi { .. } => Some(request.model.as_str()),
            },
            messages: &request.messages,
            temperature: request.temperature,
        };

        let builder = self.client.post(url).json(&body);
        let builder = match &self.flavor {
            Flavor::Azure { api_key, .. } => builder.header("api-key", api_key),
            Flavor::OpenAi { api_key, .. } => builder.bearer_auth(api_key),
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed = response.json::<CompletionResponse>().await?;
        parse_completion(parsed)
    }
}

fn parse_completion(response: CompletionResponse) -> LlmResult<ChatCompletion> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(LlmError::EmptyResponse)?;
    Ok(ChatCompletion {
        text,
        usage: response.usage,
    })
}

impl ChatModel for OpenAiChat {
    fn backend(&self) -> &'static str {
        match self.flavor {
            Flavor::Azure { .. } => "azure",
            Flavor::OpenAi { .. } => "openai",
        }
    }

    fn complete<'a>(&'a self, request: &'a ChatRequest) -> LlmFuture<'a, LlmResult<ChatCompletion>> {
        Box::pin(self.post_completion(request))
    }
}
