use thiserror::Error;

/// Boxed cause carried by registry resolution failures.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// imagepin error types
#[derive(Error, Debug)]
pub enum PinError {
    /// Marked scalar holds text that is not an image reference
    #[error("Malformed reference '{reference}' at {path}: {reason}")]
    MalformedReference {
        reference: String,
        path: String,
        reason: String,
    },

    /// Registry lookup for a reference failed
    #[error("Failed to resolve {reference}: {source}")]
    Resolution {
        reference: String,
        #[source]
        source: Cause,
    },

    /// Resolved digest did not recombine into a valid reference
    #[error("Inconsistent reference {reference}: {reason}")]
    InternalConsistency { reference: String, reason: String },

    /// OCI image reference syntax error
    #[error("OCI image error: {0}")]
    OciImageError(String),

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },

    /// YAML document could not be parsed
    #[error("Document error at line {line}: {message}")]
    DocumentError { line: usize, message: String },

    /// Timeout error
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl PinError {
    /// Wrap an arbitrary cause as a resolution failure for `reference`.
    pub fn resolution(reference: impl Into<String>, source: impl Into<Cause>) -> Self {
        PinError::Resolution {
            reference: reference.into(),
            source: source.into(),
        }
    }
}

impl From<serde_json::Error> for PinError {
    fn from(err: serde_json::Error) -> Self {
        PinError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PinError {
    fn from(err: serde_yaml::Error) -> Self {
        PinError::SerializationError(err.to_string())
    }
}

/// Result type alias for imagepin operations
pub type Result<T> = std::result::Result<T, PinError>;
