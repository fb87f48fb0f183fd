//! Rewrites annotated scalars to digest-pinned references.

use imagepin_core::audit::AuditRecord;
use imagepin_core::error::{PinError, Result};
use imagepin_core::tree::ScalarNode;

use super::resolver::DigestResolver;
use crate::oci::ImageReference;

/// Pins the value of every scalar whose trailing comment ends with the marker.
pub struct ScalarRewriter<R> {
    marker: String,
    resolver: R,
}

impl<R: DigestResolver> ScalarRewriter<R> {
    pub fn new(marker: impl Into<String>, resolver: R) -> Self {
        Self {
            marker: marker.into(),
            resolver,
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Whether `node` carries the annotation marker at the end of its comment.
    pub fn is_annotated(&self, node: &ScalarNode) -> bool {
        node.line_comment()
            .is_some_and(|comment| comment.trim_end().ends_with(self.marker.as_str()))
    }

    /// Rewrite `node` if it is annotated.
    ///
    /// Returns `Ok(None)` for unannotated scalars without touching the
    /// resolver, and for annotated scalars whose pinned text is already
    /// current. On error the node keeps its original value.
    pub async fn visit_scalar(
        &self,
        node: &mut ScalarNode,
        path: &str,
    ) -> Result<Option<AuditRecord>> {
        if !self.is_annotated(node) {
            return Ok(None);
        }

        let old = node.value().to_string();
        // Any existing digest is discarded before resolution
        let unpinned = old.split('@').next().unwrap_or_default();
        let reference = ImageReference::parse(unpinned).map_err(|e| {
            PinError::MalformedReference {
                reference: old.clone(),
                path: path.to_string(),
                reason: match e {
                    PinError::OciImageError(reason) => reason,
                    other => other.to_string(),
                },
            }
        })?;

        tracing::debug!(path, reference = %reference, "Resolving annotated reference");
        let digest = self.resolver.resolve(&reference).await?;

        let pinned = reference.with_digest(&digest).map_err(|e| {
            PinError::InternalConsistency {
                reference: old.clone(),
                reason: e.to_string(),
            }
        })?;

        let record = AuditRecord::new(path, old, pinned.to_string());
        if record.is_noop() {
            tracing::debug!(path, reference = %record.old_reference, "Reference already current");
            return Ok(None);
        }

        node.set_value(record.new_reference.clone());
        record.log();
        Ok(Some(record))
    }
}
