//! imagepin runtime: YAML documents, registry resolution and the pinning
//! pipeline.
//!
//! Pinning rewrites annotated image references in configuration files to
//! `repository[:tag]@digest`, leaving the rest of each file byte-for-byte
//! intact.

#![allow(clippy::result_large_err)]

pub mod document;
pub mod oci;
pub mod pin;
pub mod pipeline;

// Re-export common types
pub use document::{Resource, ResourceMeta, YamlFile};
pub use oci::{CredentialStore, ImageReference, RegistryAuth, RegistryResolver};
pub use pin::{
    AnnotatedSite, CachingResolver, DigestResolver, ScalarRewriter, TreeWalker, WalkError,
};
pub use pipeline::{
    registry_resolver, FileUpdate, PackagePipeline, PipelineReport, ResourceFailure, ScanEntry,
    ScanReport,
};

/// imagepin runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
