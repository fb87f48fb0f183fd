//! Audit trail for digest rewrites.

use serde::{Deserialize, Serialize};

/// One successful rewrite of a marked scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Dotted path of the scalar (e.g. ".spec.template.spec.containers.image")
    pub path: String,
    /// Value before the rewrite, exactly as it appeared in the document
    pub old_reference: String,
    /// Pinned value written back
    pub new_reference: String,
}

impl AuditRecord {
    pub fn new(
        path: impl Into<String>,
        old_reference: impl Into<String>,
        new_reference: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            old_reference: old_reference.into(),
            new_reference: new_reference.into(),
        }
    }

    /// Whether the rewrite left the text unchanged (digest already current).
    pub fn is_noop(&self) -> bool {
        self.old_reference == self.new_reference
    }

    /// Emit the record through `tracing`.
    pub fn log(&self) {
        tracing::info!(
            path = %self.path,
            old_reference = %self.old_reference,
            new_reference = %self.new_reference,
            "Updated reference"
        );
    }
}

impl std::fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.path, self.old_reference, self.new_reference
        )
    }
}
