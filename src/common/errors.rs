//! Error types for configuration loading.

use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is present but cannot be parsed.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A variable required by the selected engine is missing.
    #[error("{key} is required when LLM_ENGINE={engine}")]
    Missing {
        /// Variable name.
        key: &'static str,
        /// Selected engine.
        engine: &'static str,
    },
    /// Values parse but violate an invariant.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
