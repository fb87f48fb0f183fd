//! Depth-first traversal of a resource tree.

use futures::future::{BoxFuture, FutureExt};
use imagepin_core::audit::AuditRecord;
use imagepin_core::error::{PinError, Result};
use imagepin_core::tree::Node;

use super::resolver::DigestResolver;
use super::rewriter::ScalarRewriter;

/// A walk that stopped at its first error.
///
/// `records` holds the rewrites that completed before the failure; those
/// scalars keep their new values.
#[derive(Debug, thiserror::Error)]
#[error("{error} (at '{path}')")]
pub struct WalkError {
    pub path: String,
    pub error: PinError,
    pub records: Vec<AuditRecord>,
}

/// An annotated scalar found by [`TreeWalker::collect_annotated`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AnnotatedSite {
    pub path: String,
    pub value: String,
}

/// Visits every node of a tree in document order, handing scalars to a
/// [`ScalarRewriter`].
///
/// Paths are dotted key chains from the root (`.spec.template.image`).
/// Sequence elements share their parent's path.
pub struct TreeWalker<R> {
    rewriter: ScalarRewriter<R>,
}

impl<R: DigestResolver> TreeWalker<R> {
    pub fn new(rewriter: ScalarRewriter<R>) -> Self {
        Self { rewriter }
    }

    pub fn rewriter(&self) -> &ScalarRewriter<R> {
        &self.rewriter
    }

    /// Walk `node` from the root path, rewriting annotated scalars.
    pub async fn walk(&self, node: &mut Node) -> std::result::Result<Vec<AuditRecord>, WalkError> {
        let mut records = Vec::new();
        let mut failed_at = String::new();
        match self
            .visit(node, String::new(), &mut records, &mut failed_at)
            .await
        {
            Ok(()) => Ok(records),
            Err(error) => Err(WalkError {
                path: failed_at,
                error,
                records,
            }),
        }
    }

    /// Visit `node` at `path`. The first error aborts the remaining walk and
    /// leaves the failing scalar's path in `failed_at`.
    pub fn visit<'a>(
        &'a self,
        node: &'a mut Node,
        path: String,
        records: &'a mut Vec<AuditRecord>,
        failed_at: &'a mut String,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            match node {
                Node::Document(root) => self.visit(root, path, records, failed_at).await,
                Node::Mapping(entries) => {
                    for entry in entries.iter_mut() {
                        let child = format!("{}.{}", path, entry.key);
                        self.visit(&mut entry.value, child, records, failed_at).await?;
                    }
                    Ok(())
                }
                Node::Sequence(items) => {
                    for item in items.iter_mut() {
                        self.visit(item, path.clone(), records, failed_at).await?;
                    }
                    Ok(())
                }
                Node::Scalar(scalar) => {
                    let outcome = self.rewriter.visit_scalar(scalar, &path).await;
                    match outcome {
                        Ok(Some(record)) => {
                            records.push(record);
                            Ok(())
                        }
                        Ok(None) => Ok(()),
                        Err(e) => {
                            *failed_at = path;
                            Err(e)
                        }
                    }
                }
                Node::Opaque => Ok(()),
            }
        }
        .boxed()
    }

    /// Annotated scalars under `node`, in document order. Read-only.
    pub fn collect_annotated(&self, node: &Node) -> Vec<AnnotatedSite> {
        let mut sites = Vec::new();
        self.collect(node, String::new(), &mut sites);
        sites
    }

    fn collect(&self, node: &Node, path: String, sites: &mut Vec<AnnotatedSite>) {
        match node {
            Node::Document(root) => self.collect(root, path, sites),
            Node::Mapping(entries) => {
                for entry in entries {
                    self.collect(&entry.value, format!("{}.{}", path, entry.key), sites);
                }
            }
            Node::Sequence(items) => {
                for item in items {
                    self.collect(item, path.clone(), sites);
                }
            }
            Node::Scalar(scalar) if self.rewriter.is_annotated(scalar) => {
                sites.push(AnnotatedSite {
                    path,
                    value: scalar.value().to_string(),
                });
            }
            Node::Scalar(_) | Node::Opaque => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::YamlFile;
    use crate::pin::resolver::testing::{StubResolver, DIGEST_A, DIGEST_B};
    use imagepin_core::config::DEFAULT_MARKER;
    use std::sync::Arc;

    fn walker(stub: &Arc<StubResolver>) -> TreeWalker<Arc<StubResolver>> {
        TreeWalker::new(ScalarRewriter::new(DEFAULT_MARKER, stub.clone()))
    }

    #[tokio::test]
    async fn test_pins_single_image() {
        let digest = format!("sha256:abc123{}", "0".repeat(58));
        let stub = Arc::new(StubResolver::always(&digest));
        let mut file = YamlFile::parse("image: nginx:1.21 # pin me $update-digest$\n").unwrap();

        let records = walker(&stub)
            .walk(file.resources_mut()[0].root_mut())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, ".image");
        assert_eq!(records[0].old_reference, "nginx:1.21");
        assert_eq!(records[0].new_reference, format!("nginx:1.21@{}", digest));
        assert_eq!(
            file.render(),
            format!("image: nginx:1.21@{} # pin me $update-digest$\n", digest)
        );
    }

    #[tokio::test]
    async fn test_sequence_elements_share_parent_path() {
        let stub = Arc::new(StubResolver::always(DIGEST_A));
        let src = "a:\n  b:\n    - x # $update-digest$\n    - y # $update-digest$\n";
        let mut file = YamlFile::parse(src).unwrap();

        let records = walker(&stub)
            .walk(file.resources_mut()[0].root_mut())
            .await
            .unwrap();

        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec![".a.b", ".a.b"]);
        assert_eq!(stub.requested(), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_unannotated_tree_makes_no_calls() {
        let stub = Arc::new(StubResolver::always(DIGEST_A));
        let src = "image: nginx:1.21 # not pinned\nlist:\n  - redis:7\nflow: [alpine]\n";
        let mut file = YamlFile::parse(src).unwrap();

        let records = walker(&stub)
            .walk(file.resources_mut()[0].root_mut())
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(stub.calls(), 0);
        assert_eq!(file.render(), src);
    }

    #[tokio::test]
    async fn test_opaque_nodes_are_skipped() {
        let stub = Arc::new(StubResolver::always(DIGEST_A));
        let mut node = Node::document(Node::Sequence(vec![Node::Opaque, Node::Opaque]));
        assert!(walker(&stub).walk(&mut node).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_stops_walk() {
        let stub = Arc::new(
            StubResolver::always(DIGEST_A)
                .with("redis:7", DIGEST_B)
                .failing_for("ghcr.io/org/gone:v1"),
        );
        let src = "\
first: nginx:1.21 # $update-digest$
second:
  image: ghcr.io/org/gone:v1 # $update-digest$
third: redis:7 # $update-digest$
";
        let mut file = YamlFile::parse(src).unwrap();

        let err = walker(&stub)
            .walk(file.resources_mut()[0].root_mut())
            .await
            .unwrap_err();

        assert_eq!(err.path, ".second.image");
        assert!(matches!(err.error, PinError::Resolution { .. }));
        assert_eq!(err.records.len(), 1);
        assert_eq!(err.records[0].path, ".first");

        let rendered = file.render();
        assert!(rendered.contains(&format!("first: nginx:1.21@{} #", DIGEST_A)));
        assert!(rendered.contains("image: ghcr.io/org/gone:v1 # $update-digest$"));
        assert!(rendered.contains("third: redis:7 # $update-digest$"));
        assert_eq!(stub.requested(), vec!["nginx:1.21", "ghcr.io/org/gone:v1"]);
    }

    #[tokio::test]
    async fn test_malformed_reference_reports_path() {
        let stub = Arc::new(StubResolver::always(DIGEST_A));
        let mut file =
            YamlFile::parse("spec:\n  image: \"not a valid ref!!\" # $update-digest$\n").unwrap();

        let err = walker(&stub)
            .walk(file.resources_mut()[0].root_mut())
            .await
            .unwrap_err();

        assert_eq!(err.path, ".spec.image");
        assert!(matches!(
            err.error,
            PinError::MalformedReference { ref path, .. } if path == ".spec.image"
        ));
        assert!(!file.is_modified());
    }

    #[tokio::test]
    async fn test_collect_annotated() {
        let stub = Arc::new(StubResolver::always(DIGEST_A));
        let src = "\
containers:
  - name: web
    image: nginx:1.21 # $update-digest$
  - name: cache
    image: redis:7
initImage: busybox # $update-digest$
";
        let file = YamlFile::parse(src).unwrap();

        let sites = walker(&stub).collect_annotated(file.resources()[0].root());

        assert_eq!(
            sites,
            vec![
                AnnotatedSite {
                    path: ".containers.image".to_string(),
                    value: "nginx:1.21".to_string(),
                },
                AnnotatedSite {
                    path: ".initImage".to_string(),
                    value: "busybox".to_string(),
                },
            ]
        );
        assert_eq!(stub.calls(), 0);
    }
}
