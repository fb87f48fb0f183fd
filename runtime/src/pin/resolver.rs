//! Reference-to-digest resolution.

use std::collections::HashMap;

use async_trait::async_trait;
use imagepin_core::error::Result;
use tokio::sync::Mutex;

use crate::oci::ImageReference;

/// Resolves an image reference to its current manifest digest.
///
/// One call is one registry round trip; implementations do not retry.
/// Every failure is reported as [`imagepin_core::PinError::Resolution`].
#[async_trait]
pub trait DigestResolver: Send + Sync {
    async fn resolve(&self, reference: &ImageReference) -> Result<String>;
}

#[async_trait]
impl<R: DigestResolver + ?Sized> DigestResolver for Box<R> {
    async fn resolve(&self, reference: &ImageReference) -> Result<String> {
        (**self).resolve(reference).await
    }
}

#[async_trait]
impl<R: DigestResolver + ?Sized> DigestResolver for std::sync::Arc<R> {
    async fn resolve(&self, reference: &ImageReference) -> Result<String> {
        (**self).resolve(reference).await
    }
}

/// Memoises successful resolutions per fully-qualified reference.
///
/// Lives for one run, so repeated references across documents cost one
/// registry call. Failures are not cached.
pub struct CachingResolver<R> {
    inner: R,
    digests: Mutex<HashMap<String, String>>,
}

impl<R: DigestResolver> CachingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            digests: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<R: DigestResolver> DigestResolver for CachingResolver<R> {
    async fn resolve(&self, reference: &ImageReference) -> Result<String> {
        let key = format!(
            "{}/{}:{}",
            reference.registry,
            reference.repository,
            reference.tag_or_default()
        );
        if let Some(digest) = self.digests.lock().await.get(&key) {
            tracing::debug!(reference = %key, digest = %digest, "Using cached digest");
            return Ok(digest.clone());
        }

        let digest = self.inner.resolve(reference).await?;
        self.digests.lock().await.insert(key, digest.clone());
        Ok(digest)
    }
}
