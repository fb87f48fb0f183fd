//! Container image references and registry access.
//!
//! - [`reference`]: parsing `[registry/]repository[:tag][@digest]`
//! - [`registry`]: manifest digest lookup over the distribution API
//! - [`credentials`]: per-registry logins in Docker's `config.json`

pub mod credentials;
pub mod reference;
pub mod registry;

pub use credentials::CredentialStore;
pub use reference::{validate_digest, ImageReference};
pub use registry::{RegistryAuth, RegistryResolver};
