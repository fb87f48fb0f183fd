use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PinError, Result};

/// Comment suffix that marks a scalar for digest pinning.
pub const DEFAULT_MARKER: &str = "$update-digest$";

/// Pinning run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// Trailing-comment suffix that marks a scalar as eligible
    pub marker: String,

    /// Package root searched for documents
    pub directory: PathBuf,

    /// File extensions treated as documents (without the dot)
    pub extensions: Vec<String>,

    /// Parse every candidate file, even when its raw text lacks the marker
    pub skip_prefilter: bool,

    /// Rewrite in memory only
    pub dry_run: bool,

    /// Memoise resolved digests for the duration of one run
    pub cache_digests: bool,

    /// Registry client settings
    pub registry: RegistryConfig,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            directory: PathBuf::new(),
            extensions: vec!["yaml".to_string(), "yml".to_string()],
            skip_prefilter: false,
            dry_run: false,
            cache_digests: true,
            registry: RegistryConfig::default(),
        }
    }
}

impl PinConfig {
    /// Configuration for `directory` with every other field defaulted.
    pub fn for_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Check the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        if self.marker.trim().is_empty() {
            return Err(PinError::ConfigError(
                "annotation marker must not be empty".to_string(),
            ));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(PinError::ConfigError("directory is required".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(PinError::ConfigError(
                "at least one document extension is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registries reached over plain HTTP (e.g. "localhost:5000")
    pub insecure_registries: Vec<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            insecure_registries: Vec::new(),
            timeout_secs: 30,
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "unknown log level: '{}' (supported: trace, debug, info, warn, error)",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}
