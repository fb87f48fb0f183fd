//! Comment- and layout-preserving YAML documents.
//!
//! A file is split into resources on `---` markers. Each resource is parsed
//! into a [`Node`] tree whose scalars remember their byte span and quoting
//! style, so [`YamlFile::render`] can rewrite modified values in place and
//! leave every other byte of the file alone.

mod parser;
mod render;
mod scanner;

use std::ops::Range;

use imagepin_core::error::{PinError, Result};
use imagepin_core::tree::Node;

/// One parsed YAML file.
#[derive(Debug, Clone)]
pub struct YamlFile {
    source: String,
    resources: Vec<Resource>,
}

/// One `---`-delimited document of a file.
#[derive(Debug, Clone)]
pub struct Resource {
    root: Node,
    span: Range<usize>,
    first_line: usize,
}

/// Identifying fields of a resource, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMeta {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl YamlFile {
    /// Parse `source` into resources.
    pub fn parse(source: &str) -> Result<Self> {
        let documents = scanner::scan(source)?;
        let mut resources = Vec::with_capacity(documents.len());
        for document in documents {
            let first_line = document.lines.first().map_or(1, |l| l.number);
            let span = document.span.clone();
            let root = parser::parse_document(source, document.lines)?;
            resources.push(Resource {
                root,
                span,
                first_line,
            });
        }

        Ok(Self {
            source: source.to_string(),
            resources,
        })
    }

    /// Source text as read.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut [Resource] {
        &mut self.resources
    }

    /// Whether any scalar has been rewritten since parsing.
    pub fn is_modified(&self) -> bool {
        self.resources.iter().any(Resource::is_modified)
    }

    /// Serialize back to text. Only modified scalars differ from the source.
    pub fn render(&self) -> String {
        render::render(&self.source, self.resources.iter().map(|r| &r.root))
    }

    /// Kind and name of the resource at `index`.
    pub fn meta(&self, index: usize) -> Result<ResourceMeta> {
        let resource = self.resources.get(index).ok_or_else(|| {
            PinError::Other(format!("resource index {} out of range", index))
        })?;
        resource.meta(&self.source)
    }
}

impl Resource {
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// 1-based line where the resource begins.
    pub fn first_line(&self) -> usize {
        self.first_line
    }

    pub fn is_modified(&self) -> bool {
        let mut modified = false;
        self.root.for_each_scalar(&mut |s| modified |= s.is_modified());
        modified
    }

    /// Read `kind`, `metadata.name` and `metadata.namespace` from the
    /// resource's source text. Missing fields are empty.
    pub fn meta(&self, source: &str) -> Result<ResourceMeta> {
        let text = source.get(self.span.clone()).ok_or_else(|| {
            PinError::Other("resource span does not match its source".to_string())
        })?;
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;

        let field = |v: Option<&serde_yaml::Value>| {
            v.and_then(serde_yaml::Value::as_str).map(str::to_string)
        };
        let metadata = value.get("metadata");

        Ok(ResourceMeta {
            kind: field(value.get("kind")).unwrap_or_default(),
            name: field(metadata.and_then(|m| m.get("name"))).unwrap_or_default(),
            namespace: field(metadata.and_then(|m| m.get("namespace"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagepin_core::tree::ScalarNode;

    const DEPLOYMENT: &str = "\
# Web tier
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web   # keep me
  namespace: prod
spec:
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.21 # $update-digest$
        - name: sidecar
          image: 'envoyproxy/envoy:v1.29' # $update-digest$
---
apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  ports: [80, 443]
";

    fn find_mut<'n>(node: &'n mut Node, value: &str) -> Option<&'n mut ScalarNode> {
        match node {
            Node::Document(root) => find_mut(root, value),
            Node::Mapping(entries) => entries
                .iter_mut()
                .find_map(|e| find_mut(&mut e.value, value)),
            Node::Sequence(items) => items.iter_mut().find_map(|i| find_mut(i, value)),
            Node::Scalar(s) if s.value() == value => Some(s),
            _ => None,
        }
    }

    #[test]
    fn test_parse_splits_resources() {
        let file = YamlFile::parse(DEPLOYMENT).unwrap();
        assert_eq!(file.len(), 2);
        assert_eq!(file.resources()[0].first_line(), 1);
        assert_eq!(file.resources()[1].first_line(), 16);
    }

    #[test]
    fn test_render_unmodified_is_identical() {
        let file = YamlFile::parse(DEPLOYMENT).unwrap();
        assert!(!file.is_modified());
        assert_eq!(file.render(), DEPLOYMENT);
    }

    #[test]
    fn test_render_changes_only_rewritten_scalar() {
        let mut file = YamlFile::parse(DEPLOYMENT).unwrap();
        let root = file.resources_mut()[0].root_mut();
        find_mut(root, "nginx:1.21")
            .unwrap()
            .set_value("nginx:1.21@sha256:abc");
        assert!(file.is_modified());
        assert!(!file.resources()[1].is_modified());

        let expected = DEPLOYMENT.replace(
            "image: nginx:1.21 #",
            "image: nginx:1.21@sha256:abc #",
        );
        assert_eq!(file.render(), expected);
    }

    #[test]
    fn test_render_keeps_single_quotes() {
        let mut file = YamlFile::parse(DEPLOYMENT).unwrap();
        let root = file.resources_mut()[0].root_mut();
        find_mut(root, "envoyproxy/envoy:v1.29")
            .unwrap()
            .set_value("envoyproxy/envoy:v1.29@sha256:def");

        assert!(file
            .render()
            .contains("image: 'envoyproxy/envoy:v1.29@sha256:def' # $update-digest$"));
    }

    #[test]
    fn test_resource_meta() {
        let file = YamlFile::parse(DEPLOYMENT).unwrap();
        let meta = file.meta(0).unwrap();
        assert_eq!(meta.kind, "Deployment");
        assert_eq!(meta.name, "web");
        assert_eq!(meta.namespace.as_deref(), Some("prod"));

        let meta = file.meta(1).unwrap();
        assert_eq!(meta.kind, "Service");
        assert_eq!(meta.namespace, None);
        assert!(file.meta(2).is_err());
    }

    #[test]
    fn test_meta_missing_fields_are_empty() {
        let file = YamlFile::parse("images:\n  - nginx\n").unwrap();
        assert_eq!(file.meta(0).unwrap(), ResourceMeta::default());
    }

    #[test]
    fn test_empty_file() {
        let file = YamlFile::parse("# nothing here\n").unwrap();
        assert!(file.is_empty());
        assert_eq!(file.render(), "# nothing here\n");
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = YamlFile::parse("a: 1\n---\nb: 1\nb: 2\n").unwrap_err();
        assert!(matches!(err, PinError::DocumentError { line: 4, .. }));
    }

    #[test]
    fn test_rewrite_next_to_tabbed_block_literal() {
        let src = "kind: ConfigMap\ndata:\n  Makefile: |\n    all:\n    \techo hi\n  image: nginx:1.21 # $update-digest$\n";
        let mut file = YamlFile::parse(src).unwrap();
        assert_eq!(file.render(), src);

        find_mut(file.resources_mut()[0].root_mut(), "nginx:1.21")
            .unwrap()
            .set_value("nginx:1.21@sha256:abc");
        assert_eq!(
            file.render(),
            src.replace("nginx:1.21 #", "nginx:1.21@sha256:abc #")
        );
    }

    #[test]
    fn test_rewrite_after_multiline_quoted_scalar() {
        let src = "args: \"--a\n  --b\"\nimage: nginx:1.21 # $update-digest$\n";
        let mut file = YamlFile::parse(src).unwrap();
        assert_eq!(file.render(), src);
        assert_eq!(file.source(), src);

        find_mut(file.resources_mut()[0].root_mut(), "nginx:1.21")
            .unwrap()
            .set_value("nginx:1.21@sha256:abc");
        assert_eq!(
            file.render(),
            "args: \"--a\n  --b\"\nimage: nginx:1.21@sha256:abc # $update-digest$\n"
        );
    }

    #[test]
    fn test_null_value_rewrite_keeps_spacing() {
        let src = "image: # $update-digest$\n";
        let mut file = YamlFile::parse(src).unwrap();
        find_mut(file.resources_mut()[0].root_mut(), "")
            .unwrap()
            .set_value("nginx@sha256:abc");
        assert_eq!(file.render(), "image: nginx@sha256:abc # $update-digest$\n");
    }
}
