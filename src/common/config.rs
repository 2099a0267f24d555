//! Configuration for the chat agent.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. Parsing goes through a lookup function so tests can feed a map.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::common::errors::{ConfigError, ConfigResult};

/// Top-level configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Service name reported in logs.
    pub app_name: String,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// LLM backend settings.
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "ChatAgent".to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the environment after reading an optional `.env` file.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed.
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = get("APP_NAME") {
            config.app_name = name;
        }

        if let Some(host) = get("HOST") {
            config.server.host = host;
        }
        if let Some(port) = get("PORT") {
            config.server.port = parse_value("PORT", &port)?;
        }
        if let Some(debug) = get("DEBUG") {
            config.server.debug = parse_bool("DEBUG", &debug)?;
        }
        config.server.static_dir = get("STATIC_DIR").map(PathBuf::from);

        if let Some(path) = get("DATA_PATH") {
            config.storage.data_path = PathBuf::from(path);
        }

        if let Some(level) = get("LOG_LEVEL") {
            config.logging.level = parse_value("LOG_LEVEL", &level)?;
        }
        // An explicitly empty LOG_DIR disables the file sink.
        if let Some(dir) = lookup("LOG_DIR") {
            let dir = dir.trim();
            config.logging.dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
        }

        if let Some(engine) = get("LLM_ENGINE") {
            config.llm.engine = parse_value("LLM_ENGINE", &engine)?;
        }
        if let Some(model) = get("LLM_DEFAULT_MODEL") {
            config.llm.default_model = model;
        }
        if let Some(temperature) = get("LLM_TEMPERATURE") {
            config.llm.temperature = parse_value("LLM_TEMPERATURE", &temperature)?;
        }
        if let Some(timeout) = get("LLM_TIMEOUT_SECS") {
            config.llm.request_timeout =
                Duration::from_secs(parse_value("LLM_TIMEOUT_SECS", &timeout)?);
        }
        config.llm.azure.api_key = get("AZURE_OPENAI_API_KEY");
        config.llm.azure.endpoint = get("AZURE_OPENAI_ENDPOINT");
        config.llm.azure.api_version = get("AZURE_OPENAI_API_VERSION");
        config.llm.openai.api_key = get("OPENAI_API_KEY");
        if let Some(base_url) = get("OPENAI_BASE_URL") {
            config.llm.openai.base_url = base_url;
        }
        config.llm.ollama.base_url = get("OLLAMA_URL");

        Ok(config)
    }

    /// Load from a map; convenient in tests.
    ///
    /// # Errors
    /// Returns an error if a variable cannot be parsed.
    pub fn from_map(vars: &HashMap<String, String>) -> ConfigResult<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("PORT must be > 0".to_string()));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "LLM_TEMPERATURE must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }

        if self.llm.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "LLM_TIMEOUT_SECS must be > 0".to_string(),
            ));
        }

        if self.llm.default_model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "LLM_DEFAULT_MODEL must not be empty".to_string(),
            ));
        }

        Url::parse(&self.llm.openai.base_url)?;
        if let Some(endpoint) = &self.llm.azure.endpoint {
            Url::parse(endpoint)?;
        }
        if let Some(base_url) = &self.llm.ollama.base_url {
            Url::parse(base_url)?;
        }

        match self.llm.engine {
            LlmEngineKind::Azure => {
                let engine = LlmEngineKind::Azure.as_str();
                if self.llm.azure.endpoint.is_none() {
                    return Err(ConfigError::Missing {
                        key: "AZURE_OPENAI_ENDPOINT",
                        engine,
                    });
                }
                if self.llm.azure.api_key.is_none() {
                    return Err(ConfigError::Missing {
                        key: "AZURE_OPENAI_API_KEY",
                        engine,
                    });
                }
                if self.llm.azure.api_version.is_none() {
                    return Err(ConfigError::Missing {
                        key: "AZURE_OPENAI_API_VERSION",
                        engine,
                    });
                }
            }
            LlmEngineKind::OpenAi => {
                if self.llm.openai.api_key.is_none() {
                    return Err(ConfigError::Missing {
                        key: "OPENAI_API_KEY",
                        engine: LlmEngineKind::OpenAi.as_str(),
                    });
                }
            }
            LlmEngineKind::Ollama => {}
        }

        Ok(())
    }
}

/// HTTP server settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Force debug-level logging regardless of `LOG_LEVEL`.
    pub debug: bool,
    /// Optional directory with a built frontend.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage settings.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Root directory for all JSON data.
    pub data_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    /// Directory holding one JSON file per conversation.
    #[must_use]
    pub fn conversations_dir(&self) -> PathBuf {
        self.data_path.join("conversations")
    }

    /// Path of the folders file.
    #[must_use]
    pub fn folders_file(&self) -> PathBuf {
        self.data_path.join("folders.json")
    }

    /// Path of the tags file.
    #[must_use]
    pub fn tags_file(&self) -> PathBuf {
        self.data_path.join("tags.json")
    }
}

/// Log verbosity as accepted in `LOG_LEVEL`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug and above.
    Debug,
    /// Info and above.
    #[default]
    Info,
    /// Warnings and errors.
    Warning,
    /// Errors only.
    Error,
    /// Alias of `Error`; tracing has no higher level.
    Critical,
}

impl LogLevel {
    /// Equivalent tracing level.
    #[must_use]
    pub const fn as_tracing(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error | Self::Critical => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err("expected one of DEBUG, INFO, WARNING, ERROR, CRITICAL".to_string()),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set.
    pub level: LogLevel,
    /// Directory for `app.log`; `None` logs to the console only.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            dir: Some(PathBuf::from("./logs")),
        }
    }
}

/// Which hosted API answers chat requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmEngineKind {
    /// Azure OpenAI deployments.
    #[default]
    Azure,
    /// The public OpenAI API or a compatible gateway.
    OpenAi,
    /// A local or remote Ollama server.
    Ollama,
}

impl LlmEngineKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for LlmEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmEngineKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err("expected one of azure, openai, ollama".to_string()),
        }
    }
}

/// LLM backend settings.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Selected backend.
    pub engine: LlmEngineKind,
    /// Model (or Azure deployment) used when a conversation names none.
    pub default_model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Azure OpenAI credentials.
    pub azure: AzureConfig,
    /// OpenAI credentials.
    pub openai: OpenAiConfig,
    /// Ollama endpoint.
    pub ollama: OllamaConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            engine: LlmEngineKind::Azure,
            default_model: "gpt-4.1".to_string(),
            temperature: 0.7,
            request_timeout: Duration::from_secs(120),
            azure: AzureConfig::default(),
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// Azure OpenAI settings.
#[derive(Clone, Debug, Default)]
pub struct AzureConfig {
    /// `api-key` header value.
    pub api_key: Option<String>,
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: Option<String>,
    /// `api-version` query parameter.
    pub api_version: Option<String>,
}

/// OpenAI settings.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Bearer token.
    pub api_key: Option<String>,
    /// API base, including the `/v1` segment.
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Ollama settings.
#[derive(Clone, Debug, Default)]
pub struct OllamaConfig {
    /// Custom base URL; the client default is used when unset.
    pub base_url: Option<String>,
}

fn parse_value<T>(key: &'static str, raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: err.to_string(),
        })
}

fn parse_bool(key: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
