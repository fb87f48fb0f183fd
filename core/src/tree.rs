//! In-memory document tree.
//!
//! One tree per resource. Structure is fixed once parsed; the only mutation
//! available is replacing a scalar's value through [`ScalarNode::set_value`].

use std::ops::Range;

/// A node of a structured document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Document wrapper around the root node
    Document(Box<Node>),
    /// Key/value pairs in document order
    Mapping(Vec<MappingEntry>),
    /// Elements in document order
    Sequence(Vec<Node>),
    /// Leaf value
    Scalar(ScalarNode),
    /// Content the tree does not decompose (aliases, flow collections,
    /// block literals)
    Opaque,
}

impl Node {
    /// Wrap `root` in a document node.
    pub fn document(root: Node) -> Self {
        Node::Document(Box::new(root))
    }

    /// Look up a mapping value by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Document(root) => root.get(key),
            Node::Mapping(entries) => entries.iter().find(|e| e.key == key).map(|e| &e.value),
            _ => None,
        }
    }

    /// Scalar payload, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&ScalarNode> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Visit every scalar in document order.
    pub fn for_each_scalar<'a>(&'a self, f: &mut dyn FnMut(&'a ScalarNode)) {
        match self {
            Node::Document(root) => root.for_each_scalar(f),
            Node::Mapping(entries) => {
                for entry in entries {
                    entry.value.for_each_scalar(f);
                }
            }
            Node::Sequence(items) => {
                for item in items {
                    item.for_each_scalar(f);
                }
            }
            Node::Scalar(s) => f(s),
            Node::Opaque => {}
        }
    }
}

/// One key/value pair of a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub key: String,
    pub value: Node,
}

impl MappingEntry {
    pub fn new(key: impl Into<String>, value: Node) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// How a scalar was written in its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
}

/// Leaf node: a textual value plus its trailing line comment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarNode {
    value: String,
    line_comment: Option<String>,
    style: ScalarStyle,
    span: Range<usize>,
    modified: bool,
}

impl ScalarNode {
    /// Create a scalar occupying `span` bytes of its source.
    pub fn new(value: impl Into<String>, style: ScalarStyle, span: Range<usize>) -> Self {
        Self {
            value: value.into(),
            line_comment: None,
            style,
            span,
            modified: false,
        }
    }

    /// Plain scalar with no source position, for trees built in code.
    pub fn plain(value: impl Into<String>) -> Self {
        Self::new(value, ScalarStyle::Plain, 0..0)
    }

    /// Attach a trailing line comment (including the leading `#`).
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        let trimmed = comment.trim_end();
        self.line_comment = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn line_comment(&self) -> Option<&str> {
        self.line_comment.as_deref()
    }

    pub fn style(&self) -> ScalarStyle {
        self.style
    }

    /// Byte range of the scalar token in the source text.
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Replace the value. Marks the node modified even when the text is equal.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.modified = true;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}
