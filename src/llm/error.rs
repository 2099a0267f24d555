//! Error types for LLM calls.

use thiserror::Error;

/// LLM error type.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport error.
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("llm http status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The response held no usable choice.
    #[error("llm response contained no message")]
    EmptyResponse,
    /// Rig HTTP client error.
    #[error("rig http client error: {0}")]
    RigHttp(#[from] rig::http_client::Error),
    /// Rig completion error.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// Misconfigured backend.
    #[error("invalid llm configuration: {0}")]
    Config(String),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;
