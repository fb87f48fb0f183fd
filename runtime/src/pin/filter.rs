//! Cheap file selection ahead of parsing.

use std::path::Path;

/// True when `raw_contents` cannot contain an annotated scalar, i.e. the
/// marker does not occur anywhere in the text.
///
/// Only a prefilter: a file that passes may still have no annotated scalar,
/// for example when the marker only appears inside a value.
pub fn should_skip(raw_contents: &str, marker: &str) -> bool {
    !raw_contents.contains(marker)
}

/// Whether `path` has one of `extensions` (compared case-insensitively,
/// without the leading dot).
pub fn is_candidate(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}
