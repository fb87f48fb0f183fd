//! Splices modified scalars back into the original source text.

use imagepin_core::tree::{Node, ScalarNode, ScalarStyle};

/// Characters that may not start a plain scalar.
const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
];

/// Words a YAML 1.1 reader would not load as strings.
const RESERVED: &[&str] = &[
    "true", "false", "yes", "no", "on", "off", "y", "n", "null", "~",
];

/// Render `src` with every modified scalar in `roots` re-encoded in place.
pub(crate) fn render<'a>(src: &str, roots: impl IntoIterator<Item = &'a Node>) -> String {
    let mut edits: Vec<&ScalarNode> = Vec::new();
    for root in roots {
        root.for_each_scalar(&mut |scalar| {
            if scalar.is_modified() {
                edits.push(scalar);
            }
        });
    }
    edits.sort_by_key(|scalar| scalar.span().start);

    let mut out = String::with_capacity(src.len() + edits.len() * 80);
    let mut cursor = 0;
    for scalar in edits {
        let span = scalar.span();
        if span.start < cursor {
            continue;
        }
        out.push_str(&src[cursor..span.start]);
        if span.is_empty() && src[..span.start].ends_with(':') {
            out.push(' ');
        }
        out.push_str(&encode(scalar.value(), scalar.style()));
        if span.is_empty() && src[span.end..].starts_with('#') {
            out.push(' ');
        }
        cursor = span.end;
    }
    out.push_str(&src[cursor..]);
    out
}

/// Encode `value` in `style`, falling back to double quotes when the
/// requested style cannot represent it.
pub(crate) fn encode(value: &str, style: ScalarStyle) -> String {
    match style {
        ScalarStyle::Plain if is_plain_safe(value) => value.to_string(),
        ScalarStyle::SingleQuoted if !value.contains(['\n', '\r'].as_ref()) => {
            format!("'{}'", value.replace('\'', "''"))
        }
        _ => double_quote(value),
    }
}

fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_plain_safe(value: &str) -> bool {
    if value.is_empty() || value.trim() != value {
        return false;
    }
    if value.starts_with(INDICATORS) {
        return false;
    }
    if value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.chars().any(|c| c.is_control())
    {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    if RESERVED.contains(&lower.as_str()) || value.parse::<f64>().is_ok() {
        return false;
    }
    true
}
