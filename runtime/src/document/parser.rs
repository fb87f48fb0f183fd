//! Block-YAML parser producing a span-annotated [`Node`] tree.
//!
//! Covers the block subset used by configuration documents: mappings,
//! sequences (including compact `- key: value` items), plain and quoted
//! scalars. Aliases, flow collections, block literals and quoted scalars
//! spanning several lines are kept as [`Node::Opaque`] and left untouched.

use std::collections::HashSet;

use imagepin_core::error::{PinError, Result};
use imagepin_core::tree::{MappingEntry, Node, ScalarNode, ScalarStyle};

use super::scanner::Line;

/// Parse the lines of one document into a `Node::Document`.
pub(crate) fn parse_document(src: &str, lines: Vec<Line>) -> Result<Node> {
    let mut parser = Parser { src, lines, pos: 0 };

    let root = match parser.peek() {
        Some(_) => parser.parse_node()?,
        None => Node::Opaque,
    };
    if let Some(index) = parser.peek() {
        return Err(parser.error(index, "unexpected content after document root"));
    }

    Ok(Node::document(root))
}

struct Parser<'a> {
    src: &'a str,
    lines: Vec<Line>,
    pos: usize,
}

/// A `key:` found at the start of a line.
struct KeyToken {
    key: String,
    /// Offset just past the `:` and any following spaces
    value_start: usize,
}

impl<'a> Parser<'a> {
    /// Index of the next line with content, skipping blank and comment-only lines.
    fn peek(&mut self) -> Option<usize> {
        while self.pos < self.lines.len() && self.lines[self.pos].is_blank() {
            self.pos += 1;
        }
        (self.pos < self.lines.len()).then_some(self.pos)
    }

    fn text(&self, index: usize) -> &'a str {
        &self.src[self.lines[index].content.clone()]
    }

    fn error(&self, index: usize, message: &str) -> PinError {
        PinError::DocumentError {
            line: self.lines[index].number,
            message: message.to_string(),
        }
    }

    /// Reject a line that starts a node but is indented with a tab.
    fn check_indent(&self, index: usize) -> Result<()> {
        if self.lines[index].tab_indent {
            return Err(self.error(index, "tabs are not allowed in indentation"));
        }
        Ok(())
    }

    fn comment(&self, index: usize) -> Option<&'a str> {
        self.lines[index]
            .comment
            .clone()
            .map(|range| &self.src[range])
    }

    fn is_sequence_entry(&self, index: usize) -> bool {
        let text = self.text(index);
        text == "-" || text.starts_with("- ") || text.starts_with("-\t")
    }

    /// Move the start of line `index` to `offset`, so a compact nested node
    /// can be parsed as if it began its own line at that column.
    fn shift_line(&mut self, index: usize, offset: usize) {
        let line = &mut self.lines[index];
        line.indent = line.column(offset);
        line.content.start = offset;
    }

    /// Parse the node starting at the next significant line.
    fn parse_node(&mut self) -> Result<Node> {
        let index = self.peek().ok_or_else(|| PinError::DocumentError {
            line: self.lines.last().map_or(0, |l| l.number),
            message: "unexpected end of document".to_string(),
        })?;
        self.check_indent(index)?;
        let indent = self.lines[index].indent;

        if self.is_sequence_entry(index) {
            return self.parse_sequence(indent);
        }
        if self.key_token(index)?.is_some() {
            return self.parse_mapping(indent);
        }
        let start = self.lines[index].content.start;
        self.parse_value(index, start, indent, None)
    }

    fn parse_mapping(&mut self, indent: usize) -> Result<Node> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        while let Some(index) = self.peek() {
            self.check_indent(index)?;
            let line_indent = self.lines[index].indent;
            if line_indent < indent {
                break;
            }
            if line_indent > indent {
                return Err(self.error(index, "unexpected indentation"));
            }
            if self.is_sequence_entry(index) {
                return Err(self.error(index, "sequence entry where a mapping key was expected"));
            }
            let token = self
                .key_token(index)?
                .ok_or_else(|| self.error(index, "expected a mapping key"))?;
            if !seen.insert(token.key.clone()) {
                return Err(self.error(index, &format!("duplicate key '{}'", token.key)));
            }

            let value = self.parse_value(index, token.value_start, indent + 1, Some(indent))?;
            entries.push(MappingEntry::new(token.key, value));
        }

        Ok(Node::Mapping(entries))
    }

    fn parse_sequence(&mut self, indent: usize) -> Result<Node> {
        let mut items = Vec::new();

        while let Some(index) = self.peek() {
            self.check_indent(index)?;
            let line_indent = self.lines[index].indent;
            if line_indent < indent || !self.is_sequence_entry(index) {
                break;
            }
            if line_indent > indent {
                return Err(self.error(index, "unexpected indentation"));
            }

            let line = &self.lines[index];
            let after_dash = line.content.start + 1;
            let rest = &self.src[after_dash..line.content.end];
            let item_start = after_dash + (rest.len() - rest.trim_start().len());

            if item_start >= line.content.end {
                items.push(self.parse_value(index, item_start, indent + 1, None)?);
                continue;
            }

            self.shift_line(index, item_start);
            let item = if self.is_sequence_entry(index) {
                let nested = self.lines[index].indent;
                self.parse_sequence(nested)?
            } else if self.key_token(index)?.is_some() {
                let nested = self.lines[index].indent;
                self.parse_mapping(nested)?
            } else {
                self.parse_value(index, item_start, indent + 1, None)?
            };
            items.push(item);
        }

        Ok(Node::Sequence(items))
    }

    /// Parse the value beginning at `start` on line `index`.
    ///
    /// Child blocks on following lines must be indented at least
    /// `min_indent`. `mapping_indent` is set for mapping values, where a
    /// sequence may also start at the key's own indentation.
    fn parse_value(
        &mut self,
        index: usize,
        start: usize,
        min_indent: usize,
        mapping_indent: Option<usize>,
    ) -> Result<Node> {
        let end = self.lines[index].content.end;
        let start = self.skip_properties(start, end);
        let rest = &self.src[start..end];
        let comment = self.comment(index);

        if rest.is_empty() {
            self.pos = index + 1;
            if let Some(next) = self.peek() {
                let next_indent = self.lines[next].indent;
                let same_level_sequence =
                    mapping_indent == Some(next_indent) && self.is_sequence_entry(next);
                if next_indent >= min_indent || same_level_sequence {
                    return self.parse_node();
                }
            }
            let null = ScalarNode::new("", ScalarStyle::Plain, start..start);
            return Ok(Node::Scalar(with_comment(null, comment)));
        }

        match rest.as_bytes()[0] {
            b'*' => {
                self.pos = index + 1;
                Ok(Node::Opaque)
            }
            b'|' | b'>' => {
                self.pos = index + 1;
                self.skip_nested_lines(min_indent);
                Ok(Node::Opaque)
            }
            b'[' | b'{' => {
                self.pos = index + 1;
                if !flow_balanced(rest) {
                    self.skip_nested_lines(min_indent);
                }
                Ok(Node::Opaque)
            }
            b'"' | b'\'' => {
                let (value, len) = match parse_quoted(rest) {
                    Ok(parsed) => parsed,
                    Err(_) => return self.skip_multiline_quoted(index, start),
                };
                if !rest[len..].trim().is_empty() {
                    return Err(self.error(index, "unexpected content after quoted scalar"));
                }
                let style = if rest.starts_with('"') {
                    ScalarStyle::DoubleQuoted
                } else {
                    ScalarStyle::SingleQuoted
                };
                self.pos = index + 1;
                let scalar = ScalarNode::new(value, style, start..start + len);
                Ok(Node::Scalar(with_comment(scalar, comment)))
            }
            _ => {
                if rest.starts_with("- ") || rest == "-" {
                    return Err(self.error(index, "block sequence entries are not allowed here"));
                }
                if rest.contains(": ") || rest.ends_with(':') {
                    return Err(self.error(index, "mapping values are not allowed here"));
                }
                self.parse_plain(index, start, min_indent)
            }
        }
    }

    /// Plain scalar, folding more-indented continuation lines.
    fn parse_plain(&mut self, index: usize, start: usize, min_indent: usize) -> Result<Node> {
        let mut value = self.src[start..self.lines[index].content.end].to_string();
        let mut last = index;

        while self.lines[last].comment.is_none() {
            let next = last + 1;
            let Some(line) = self.lines.get(next) else {
                break;
            };
            if line.is_blank() || line.indent < min_indent {
                break;
            }
            let text = self.text(next);
            if text.contains(": ") || text.starts_with("- ") {
                break;
            }
            value.push(' ');
            value.push_str(text);
            last = next;
        }

        self.pos = last + 1;
        let end = self.lines[last].content.end;
        let scalar = ScalarNode::new(value, ScalarStyle::Plain, start..end);
        Ok(Node::Scalar(with_comment(scalar, self.comment(last))))
    }

    /// Skip `&anchor` and `!tag` properties in front of a value.
    fn skip_properties(&self, mut start: usize, end: usize) -> usize {
        loop {
            let rest = &self.src[start..end];
            if !(rest.starts_with('&') || rest.starts_with('!')) {
                return start;
            }
            let token_len = rest.find(&[' ', '\t'][..]).unwrap_or(rest.len());
            let after = &rest[token_len..];
            start += token_len + (after.len() - after.trim_start().len());
        }
    }

    /// Consume lines that belong to a block literal or multi-line flow node.
    fn skip_nested_lines(&mut self, min_indent: usize) {
        while self.pos < self.lines.len() {
            let line = &self.lines[self.pos];
            if !line.is_blank() && line.indent < min_indent {
                break;
            }
            self.pos += 1;
        }
    }

    /// Consume a quoted scalar that opens at `start` on line `index` and
    /// closes on a later line.
    fn skip_multiline_quoted(&mut self, index: usize, start: usize) -> Result<Node> {
        let (_, len) = parse_quoted(&self.src[start..]).map_err(|m| self.error(index, &m))?;
        let end = start + len;
        let last = (index..self.lines.len())
            .take_while(|&i| self.lines[i].start < end)
            .last()
            .unwrap_or(index);

        let content_end = self.lines[last].content.end;
        if end > content_end {
            return Err(self.error(index, "unterminated quoted scalar"));
        }
        if !self.src[end..content_end].trim().is_empty() {
            return Err(self.error(last, "unexpected content after quoted scalar"));
        }
        self.pos = last + 1;
        Ok(Node::Opaque)
    }

    /// Recognise `key:` (plain or quoted key) at the start of line `index`.
    fn key_token(&self, index: usize) -> Result<Option<KeyToken>> {
        let text = self.text(index);
        let base = self.lines[index].content.start;

        let (key, after_key) = if text.starts_with('"') || text.starts_with('\'') {
            let (key, len) = match parse_quoted(text) {
                Ok(parsed) => parsed,
                Err(_) => return Ok(None),
            };
            let after = &text[len..];
            let trimmed = after.trim_start();
            if !trimmed.starts_with(':') {
                return Ok(None);
            }
            (key, len + (after.len() - trimmed.len()))
        } else {
            if text.starts_with(&['[', '{', '&', '*', '!', '|', '>', '%', '@', '`', '#'][..]) {
                return Ok(None);
            }
            if text.starts_with("? ") || text == "?" {
                return Err(self.error(index, "complex mapping keys are not supported"));
            }
            let colon = match find_key_colon(text) {
                Some(colon) => colon,
                None => return Ok(None),
            };
            (text[..colon].trim_end().to_string(), colon)
        };

        // after_key points at ':', which must end the line or precede a space
        let after_colon = &text[after_key + 1..];
        if !(after_colon.is_empty() || after_colon.starts_with(&[' ', '\t'][..])) {
            return Ok(None);
        }
        if key.is_empty() {
            return Err(self.error(index, "empty mapping key"));
        }
        let spaces = after_colon.len() - after_colon.trim_start().len();

        Ok(Some(KeyToken {
            key,
            value_start: base + after_key + 1 + spaces,
        }))
    }
}

fn with_comment(scalar: ScalarNode, comment: Option<&str>) -> ScalarNode {
    match comment {
        Some(comment) => scalar.with_comment(comment),
        None => scalar,
    }
}

/// First `:` followed by whitespace or end of text.
fn find_key_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b':' && bytes.get(i + 1).map_or(true, |b| *b == b' ' || *b == b'\t')
    })
}

/// Whether every bracket opened in a single-line flow node is closed.
fn flow_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '{') => depth += 1,
            (None, ']' | '}') => depth -= 1,
            _ => {}
        }
    }
    depth <= 0
}

/// Parse a quoted scalar at the start of `text`.
///
/// Returns the unescaped value and the byte length including both quotes.
pub(crate) fn parse_quoted(text: &str) -> std::result::Result<(String, usize), String> {
    let mut chars = text.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return Err("expected a quoted scalar".to_string()),
    };

    let mut value = String::new();
    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            ('\'', '\'') => {
                if text[i + 1..].starts_with('\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    return Ok((value, i + 1));
                }
            }
            ('"', '"') => return Ok((value, i + 1)),
            ('"', '\\') => {
                let (_, escape) = chars
                    .next()
                    .ok_or_else(|| "unterminated escape sequence".to_string())?;
                match escape {
                    'n' => value.push('\n'),
                    't' | '\t' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    ' ' => value.push(' '),
                    '/' => value.push('/'),
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    // Escaped line break
                    '\n' | '\r' => {}
                    'x' | 'u' | 'U' => {
                        let width = match escape {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let mut code = 0u32;
                        for _ in 0..width {
                            let digit = chars
                                .next()
                                .and_then(|(_, d)| d.to_digit(16))
                                .ok_or_else(|| format!("invalid \\{} escape", escape))?;
                            code = code * 16 + digit;
                        }
                        let ch = char::from_u32(code)
                            .ok_or_else(|| format!("invalid code point {:#x}", code))?;
                        value.push(ch);
                    }
                    other => return Err(format!("unknown escape sequence '\\{}'", other)),
                }
            }
            _ => value.push(c),
        }
    }

    Err("unterminated quoted scalar".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::scanner::scan;

    fn parse(src: &str) -> Node {
        let mut docs = scan(src).unwrap();
        assert_eq!(docs.len(), 1);
        parse_document(src, docs.remove(0).lines).unwrap()
    }

    fn parse_err(src: &str) -> PinError {
        let mut docs = scan(src).unwrap();
        parse_document(src, docs.remove(0).lines).unwrap_err()
    }

    fn scalar<'n>(node: &'n Node, path: &[&str]) -> &'n ScalarNode {
        let mut current = node;
        for key in path {
            current = current.get(key).unwrap_or_else(|| panic!("missing {}", key));
        }
        current.as_scalar().unwrap()
    }

    #[test]
    fn test_simple_mapping_with_comment() {
        let src = "image: nginx:1.21 # pin me $update-digest$\n";
        let doc = parse(src);
        let image = scalar(&doc, &["image"]);
        assert_eq!(image.value(), "nginx:1.21");
        assert_eq!(image.line_comment(), Some("# pin me $update-digest$"));
        assert_eq!(&src[image.span()], "nginx:1.21");
        assert_eq!(image.style(), ScalarStyle::Plain);
    }

    #[test]
    fn test_nested_mappings_and_sequences() {
        let src = "\
apiVersion: apps/v1
kind: Deployment
spec:
  template:
    spec:
      containers:
        - name: web
          image: nginx:1.21 # $update-digest$
        - name: sidecar
          image: envoyproxy/envoy:v1.29
";
        let doc = parse(src);
        let Node::Document(root) = &doc else { panic!() };
        let containers = root
            .get("spec")
            .and_then(|n| n.get("template"))
            .and_then(|n| n.get("spec"))
            .and_then(|n| n.get("containers"))
            .unwrap();
        let Node::Sequence(items) = containers else { panic!("not a sequence") };
        assert_eq!(items.len(), 2);
        let web = items[0].get("image").and_then(Node::as_scalar).unwrap();
        assert_eq!(web.value(), "nginx:1.21");
        assert_eq!(web.line_comment(), Some("# $update-digest$"));
        let sidecar = items[1].get("name").and_then(Node::as_scalar).unwrap();
        assert_eq!(sidecar.value(), "sidecar");
    }

    #[test]
    fn test_sequence_at_key_indent() {
        let src = "images:\n- a:1\n- b:2\nnext: value\n";
        let doc = parse(src);
        let Some(Node::Sequence(items)) = doc.get("images") else { panic!() };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_scalar().unwrap().value(), "b:2");
        assert_eq!(scalar(&doc, &["next"]).value(), "value");
    }

    #[test]
    fn test_nested_compact_sequences() {
        let src = "- - a\n  - b\n- c\n";
        let doc = parse(src);
        let Node::Document(root) = doc else { panic!() };
        let Node::Sequence(outer) = *root else { panic!() };
        assert_eq!(outer.len(), 2);
        let Node::Sequence(inner) = &outer[0] else { panic!() };
        assert_eq!(inner[1].as_scalar().unwrap().value(), "b");
    }

    #[test]
    fn test_quoted_scalars() {
        let src = "a: \"ghcr.io/org/app:v1\" # $update-digest$\nb: 'it''s'\nc: \"tab\\there \\u00e9\"\n";
        let doc = parse(src);
        let a = scalar(&doc, &["a"]);
        assert_eq!(a.value(), "ghcr.io/org/app:v1");
        assert_eq!(a.style(), ScalarStyle::DoubleQuoted);
        assert_eq!(&src[a.span()], "\"ghcr.io/org/app:v1\"");
        assert_eq!(a.line_comment(), Some("# $update-digest$"));
        assert_eq!(scalar(&doc, &["b"]).value(), "it's");
        assert_eq!(scalar(&doc, &["c"]).value(), "tab\there é");
    }

    #[test]
    fn test_quoted_keys() {
        let doc = parse("\"app.kubernetes.io/name\": web\n'x': y\n");
        assert_eq!(scalar(&doc, &["app.kubernetes.io/name"]).value(), "web");
        assert_eq!(scalar(&doc, &["x"]).value(), "y");
    }

    #[test]
    fn test_opaque_values() {
        let src = "\
alias: *base
flow: [a, b]
multi: {a: 1,
  b: 2}
script: |
  echo hi # not a comment
  exit 0
after: kept
";
        let doc = parse(src);
        assert_eq!(doc.get("alias"), Some(&Node::Opaque));
        assert_eq!(doc.get("flow"), Some(&Node::Opaque));
        assert_eq!(doc.get("multi"), Some(&Node::Opaque));
        assert_eq!(doc.get("script"), Some(&Node::Opaque));
        assert_eq!(scalar(&doc, &["after"]).value(), "kept");
    }

    #[test]
    fn test_anchor_and_tag_skipped() {
        let src = "base: &img nginx:1.21 # $update-digest$\ntagged: !!str 42\nnested: &n\n  x: 1\n";
        let doc = parse(src);
        let base = scalar(&doc, &["base"]);
        assert_eq!(base.value(), "nginx:1.21");
        assert_eq!(&src[base.span()], "nginx:1.21");
        assert_eq!(scalar(&doc, &["tagged"]).value(), "42");
        assert_eq!(scalar(&doc, &["nested", "x"]).value(), "1");
    }

    #[test]
    fn test_null_value_keeps_comment() {
        let doc = parse("image: # $update-digest$\nother: 1\n");
        let image = scalar(&doc, &["image"]);
        assert_eq!(image.value(), "");
        assert_eq!(image.line_comment(), Some("# $update-digest$"));
    }

    #[test]
    fn test_multiline_plain_scalar() {
        let src = "description: a long\n  folded value # trailing\nnext: 1\n";
        let doc = parse(src);
        let d = scalar(&doc, &["description"]);
        assert_eq!(d.value(), "a long folded value");
        assert_eq!(d.line_comment(), Some("# trailing"));
        assert_eq!(&src[d.span()], "a long\n  folded value");
    }

    #[test]
    fn test_empty_sequence_item_with_nested_block() {
        let doc = parse("items:\n  -\n    name: a\n  - b\n");
        let Some(Node::Sequence(items)) = doc.get("items") else { panic!() };
        assert_eq!(items[0].get("name").and_then(Node::as_scalar).unwrap().value(), "a");
        assert_eq!(items[1].as_scalar().unwrap().value(), "b");
    }

    #[test]
    fn test_tabs_inside_block_literal() {
        let src = "\
kind: ConfigMap
data:
  Makefile: |
    all:
    \techo hi
  image: nginx:1.21 # $update-digest$
";
        let doc = parse(src);
        assert_eq!(doc.get("data").and_then(|d| d.get("Makefile")), Some(&Node::Opaque));
        let image = scalar(&doc, &["data", "image"]);
        assert_eq!(image.value(), "nginx:1.21");
        assert_eq!(image.line_comment(), Some("# $update-digest$"));
    }

    #[test]
    fn test_tab_indentation_rejected() {
        assert!(matches!(
            parse_err("a:\n\tb: 1\n"),
            PinError::DocumentError { line: 2, .. }
        ));
        assert!(matches!(
            parse_err("a: 1\n\tb: 2\n"),
            PinError::DocumentError { line: 2, .. }
        ));
    }

    #[test]
    fn test_multiline_quoted_scalars_are_opaque() {
        let src = "\
args: \"--a
  --b\"
note: 'first
  second' # kept
escaped: \"one \\
  two\"
image: nginx:1.21 # $update-digest$
";
        let doc = parse(src);
        assert_eq!(doc.get("args"), Some(&Node::Opaque));
        assert_eq!(doc.get("note"), Some(&Node::Opaque));
        assert_eq!(doc.get("escaped"), Some(&Node::Opaque));
        assert_eq!(scalar(&doc, &["image"]).value(), "nginx:1.21");
    }

    #[test]
    fn test_multiline_quoted_scalar_errors() {
        assert!(matches!(
            parse_err("a: \"open\n  still open\n"),
            PinError::DocumentError { line: 1, .. }
        ));
        assert!(matches!(
            parse_err("a: \"x\n  y\" z\nb: 1\n"),
            PinError::DocumentError { line: 2, .. }
        ));
    }

    #[test]
    fn test_root_scalar() {
        let doc = parse("just-a-string\n");
        let Node::Document(root) = doc else { panic!() };
        assert_eq!(root.as_scalar().unwrap().value(), "just-a-string");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_err("a: 1\na: 2\n"),
            PinError::DocumentError { line: 2, .. }
        ));
        assert!(matches!(
            parse_err("a:\n  b: 1\n   c: 2\n"),
            PinError::DocumentError { line: 3, .. }
        ));
        assert!(matches!(
            parse_err("a: b: c\n"),
            PinError::DocumentError { line: 1, .. }
        ));
        assert!(matches!(
            parse_err("a: \"open\n"),
            PinError::DocumentError { line: 1, .. }
        ));
        assert!(matches!(
            parse_err("? complex\n: value\n"),
            PinError::DocumentError { line: 1, .. }
        ));
        assert!(matches!(
            parse_err("a: 1\n- b\n"),
            PinError::DocumentError { line: 2, .. }
        ));
    }

    #[test]
    fn test_parse_quoted_lengths() {
        assert_eq!(parse_quoted("\"abc\" rest").unwrap(), ("abc".to_string(), 5));
        assert_eq!(parse_quoted("'a''b'").unwrap(), ("a'b".to_string(), 6));
        assert!(parse_quoted("\"bad \\q\"").is_err());
        assert!(parse_quoted("'never closed").is_err());
    }
}
