//! Bridge configuration and logging setup

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::warn;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_WORKER_THREADS: usize = 4;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace", "none"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Native calls allowed to run at once.
    pub worker_threads: usize,
    /// One of `error`, `warn`, `info`, `debug`, `trace`, `none`.
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

impl BridgeConfig {
    /// Read `UPLINK_WORKER_THREADS`, `UPLINK_LOG_LEVEL` and `UPLINK_LOG_FILE`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`BridgeConfig::from_env`], with a custom variable source.
    /// Invalid values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("UPLINK_WORKER_THREADS") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => config.worker_threads = n,
                _ => warn!(value = %raw, "UPLINK_WORKER_THREADS: expected a positive integer"),
            }
        }
        if let Some(raw) = lookup("UPLINK_LOG_LEVEL") {
            let level = raw.trim().to_ascii_lowercase();
            if LOG_LEVELS.contains(&level.as_str()) {
                config.log_level = level;
            } else {
                warn!(value = %raw, "UPLINK_LOG_LEVEL: unknown level");
            }
        }
        config.log_file = lookup("UPLINK_LOG_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        config
    }

    /// Directive for `EnvFilter`.
    #[must_use]
    pub fn filter_directive(&self) -> &str {
        match self.log_level.as_str() {
            "none" => "off",
            level => level,
        }
    }
}

/// Install the global `tracing` subscriber. Later calls leave the first
/// subscriber in place.
///
/// # Errors
/// If the log file cannot be opened.
pub fn init_logging(config: &BridgeConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(config.filter_directive())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::LogFile {
                    path: path.clone(),
                    source,
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
