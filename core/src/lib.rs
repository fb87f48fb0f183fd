//! imagepin core - shared types for digest pinning.
//!
//! Error type, run configuration, the document tree the walker operates on,
//! and the audit record produced for every rewrite.

pub mod audit;
pub mod config;
pub mod error;
pub mod tree;

// Re-export commonly used types
pub use audit::AuditRecord;
pub use config::{LogLevel, PinConfig, RegistryConfig, DEFAULT_MARKER};
pub use error::{PinError, Result};
pub use tree::{MappingEntry, Node, ScalarNode, ScalarStyle};

/// imagepin version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
