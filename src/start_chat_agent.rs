//! Startup helpers for the chat agent server.

use std::fs::{self, OpenOptions};
use std::io;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::common::config::{AppConfig, LogLevel, LoggingConfig};
use crate::server::{self, AppState};

/// Log file written inside the configured log directory.
pub const LOG_FILE: &str = "app.log";

/// Run the server until Ctrl+C.
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LoggingConfig::default(), false);
            tracing::error!("Invalid configuration: {e:#}");
            return ExitCode::from(1);
        }
    };

    init_logging(&config.logging, config.server.debug);
    tracing::info!(
        "Starting {} v{} (llm engine: {}, data: {})",
        config.app_name,
        env!("CARGO_PKG_VERSION"),
        config.llm.engine,
        config.storage.data_path.display()
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = rt.block_on(async {
        let state = initialize(config).await?;
        server::run_server_with_shutdown(state, shutdown_signal())
            .await
            .context("server error")
    });

    if let Err(e) = result {
        tracing::error!("{e:#}");
        return ExitCode::from(1);
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

/// Read `.env` and the environment, then validate.
///
/// # Errors
/// Returns an error if a value cannot be parsed or the settings are inconsistent.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    config.validate().context("configuration rejected")?;
    Ok(config)
}

/// Build application state and make sure the default folder exists.
///
/// # Errors
/// Returns an error if the LLM backend cannot be created or the folders file
/// cannot be read or written.
pub async fn initialize(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let state = AppState::new(config).context("failed to create LLM backend")?;
    if state
        .folders
        .ensure_default()
        .await
        .context("failed to prepare folders")?
    {
        tracing::info!("Created default folder");
    }
    Ok(state)
}

/// Console logging plus `app.log` in the configured directory.
///
/// `RUST_LOG` overrides the configured level. A log file that cannot be
/// opened downgrades to console-only logging.
fn init_logging(logging: &LoggingConfig, debug: bool) {
    let level = if debug { LogLevel::Debug } else { logging.level };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level.as_tracing()).into())
        .from_env_lossy();

    let (file, file_error) = match logging.dir.as_deref().map(open_log_file).transpose() {
        Ok(file) => (file, None),
        Err(e) => (None, Some(e)),
    };
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!("File logging disabled: {e}");
    }
}

fn open_log_file(dir: &std::path::Path) -> io::Result<fs::File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
