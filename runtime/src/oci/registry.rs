//! OCI registry client for resolving manifest digests.
//!
//! Uses the `oci-distribution` crate to talk to container registries
//! (Docker Hub, GHCR, etc.). One resolution is one manifest request.

use std::time::Duration;

use async_trait::async_trait;
use imagepin_core::config::RegistryConfig;
use imagepin_core::error::{PinError, Result};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};

use super::credentials::CredentialStore;
use super::reference::{validate_digest, ImageReference};
use crate::pin::DigestResolver;

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    /// Create authentication from the credential store, falling back to env vars,
    /// then anonymous.
    pub fn from_credential_store(registry: &str) -> Self {
        if let Ok(store) = CredentialStore::default_path() {
            match store.get(registry) {
                Ok(Some((username, password))) => return Self::basic(username, password),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(registry, error = %e, "Ignoring unreadable credential store")
                }
            }
        }
        Self::from_env()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    /// Convert to oci-distribution auth type.
    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Resolves references against live registries.
pub struct RegistryResolver {
    client: Client,
    auth: Option<RegistryAuth>,
    timeout: Duration,
}

impl RegistryResolver {
    /// Resolver that looks up credentials per registry.
    pub fn new(config: &RegistryConfig) -> Self {
        let client_config = ClientConfig {
            protocol: if config.insecure_registries.is_empty() {
                ClientProtocol::Https
            } else {
                ClientProtocol::HttpsExcept(config.insecure_registries.clone())
            },
            ..Default::default()
        };

        Self {
            client: Client::new(client_config),
            auth: None,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Use `auth` for every registry instead of per-registry lookup.
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    fn auth_for(&self, registry: &str) -> RegistryAuth {
        self.auth
            .clone()
            .unwrap_or_else(|| RegistryAuth::from_credential_store(registry))
    }

    /// Convert an ImageReference to an oci-distribution Reference.
    ///
    /// Always addresses by tag: any digest on the input is ignored.
    fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
        let ref_str = format!(
            "{}/{}:{}",
            reference.registry,
            reference.repository,
            reference.tag_or_default()
        );

        ref_str.parse::<Reference>().map_err(|e| {
            PinError::OciImageError(format!("Invalid OCI reference '{}': {}", ref_str, e))
        })
    }
}

#[async_trait]
impl DigestResolver for RegistryResolver {
    async fn resolve(&self, reference: &ImageReference) -> Result<String> {
        let shown = reference.to_string();
        let oci_ref = Self::to_oci_reference(reference)
            .map_err(|e| PinError::resolution(shown.clone(), e))?;
        let auth = self.auth_for(&reference.registry);

        tracing::debug!(
            reference = %oci_ref,
            anonymous = auth.is_anonymous(),
            "Fetching manifest digest"
        );

        let oci_auth = auth.to_oci_auth();
        let request = self.client.fetch_manifest_digest(&oci_ref, &oci_auth);
        let digest = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                PinError::resolution(
                    shown.clone(),
                    PinError::TimeoutError(format!(
                        "no response from {} within {}s",
                        reference.registry,
                        self.timeout.as_secs()
                    )),
                )
            })?
            .map_err(|e| {
                PinError::resolution(
                    shown.clone(),
                    PinError::RegistryError {
                        registry: reference.registry.clone(),
                        message: e.to_string(),
                    },
                )
            })?;

        validate_digest(&digest).map_err(|reason| {
            PinError::resolution(
                shown.clone(),
                PinError::RegistryError {
                    registry: reference.registry.clone(),
                    message: format!("malformed digest in response: {}", reason),
                },
            )
        })?;

        tracing::debug!(
            reference = %reference.full_reference(),
            digest = %digest,
            "Resolved digest"
        );
        Ok(digest)
    }
}
