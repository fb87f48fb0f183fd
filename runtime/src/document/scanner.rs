//! Line scanner: splits source text into lines with indentation, content
//! and trailing-comment ranges, and groups lines into documents.

use std::ops::Range;

use imagepin_core::error::{PinError, Result};

/// One physical line of the source.
#[derive(Debug, Clone)]
pub(crate) struct Line {
    /// 1-based line number
    pub number: usize,
    /// Byte offset of the first byte of the line
    pub start: usize,
    /// Column of `content.start`
    pub indent: usize,
    /// Content without indentation, trailing comment or trailing whitespace
    pub content: Range<usize>,
    /// `#…` comment with trailing whitespace trimmed
    pub comment: Option<Range<usize>>,
    /// Content is preceded by a tab after the leading spaces. Only an error
    /// where the line starts a node; block scalar content may use tabs.
    pub tab_indent: bool,
}

impl Line {
    pub fn is_blank(&self) -> bool {
        self.content.is_empty()
    }

    pub fn column(&self, offset: usize) -> usize {
        offset - self.start
    }
}

/// Lines of one `---`-delimited document.
#[derive(Debug)]
pub(crate) struct DocumentLines {
    pub lines: Vec<Line>,
    /// Byte range covered by the document's lines
    pub span: Range<usize>,
}

/// Scan `src` into documents. Documents without content are dropped.
pub(crate) fn scan(src: &str) -> Result<Vec<DocumentLines>> {
    let mut documents = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    let mut ended = false;
    let mut offset = 0;

    for (index, raw) in src.split_inclusive('\n').enumerate() {
        let number = index + 1;
        let start = offset;
        offset += raw.len();
        let text = raw.trim_end_matches('\n').trim_end_matches('\r');

        if is_marker(text, "---") {
            let rest = text[3..].trim_start();
            if !rest.is_empty() && !rest.starts_with('#') {
                return Err(PinError::DocumentError {
                    line: number,
                    message: "content after '---' document marker is not supported".to_string(),
                });
            }
            flush(&mut documents, &mut current);
            ended = false;
            continue;
        }
        if is_marker(text, "...") {
            flush(&mut documents, &mut current);
            ended = true;
            continue;
        }
        if ended || (text.starts_with('%') && current.iter().all(Line::is_blank)) {
            // Directives and anything after an explicit document end
            continue;
        }

        current.push(scan_line(number, start, text));
    }
    flush(&mut documents, &mut current);

    Ok(documents)
}

fn is_marker(text: &str, marker: &str) -> bool {
    text.starts_with(marker)
        && text[marker.len()..]
            .chars()
            .next()
            .map_or(true, |c| c == ' ' || c == '\t')
}

fn flush(documents: &mut Vec<DocumentLines>, current: &mut Vec<Line>) {
    let lines = std::mem::take(current);
    if lines.iter().all(Line::is_blank) {
        return;
    }
    let span_start = lines.first().map_or(0, |l| l.start);
    let span_end = lines
        .last()
        .map_or(span_start, |l| l.comment.as_ref().map_or(l.content.end, |c| c.end.max(l.content.end)));
    documents.push(DocumentLines {
        lines,
        span: span_start..span_end,
    });
}

fn scan_line(number: usize, start: usize, text: &str) -> Line {
    let indent = text.len() - text.trim_start_matches(' ').len();
    let after_indent = &text[indent..];
    let tab_indent = after_indent.starts_with('\t') && !after_indent.trim().is_empty();

    let body = after_indent.trim_start();
    let body_start = start + (text.len() - body.len());
    let comment_at = find_comment(body);

    let (content_text, comment) = match comment_at {
        Some(pos) => {
            let comment_text = body[pos..].trim_end();
            let comment_start = body_start + pos;
            (
                &body[..pos],
                Some(comment_start..comment_start + comment_text.len()),
            )
        }
        None => (body, None),
    };
    let content_len = content_text.trim_end().len();

    Line {
        number,
        start,
        indent: body_start - start,
        content: body_start..body_start + content_len,
        comment,
        tab_indent,
    }
}

/// Offset of a `#` that starts a comment, ignoring `#` inside quoted
/// scalars and `#` not preceded by whitespace.
fn find_comment(body: &str) -> Option<usize> {
    #[derive(PartialEq)]
    enum State {
        Plain,
        Single,
        Double,
    }

    let bytes = body.as_bytes();
    let mut state = State::Plain;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let at_token_start = i == 0 || matches!(bytes[i - 1], b' ' | b'\t' | b',' | b'[' | b'{');
        match state {
            State::Plain => match b {
                b'#' if i == 0 || matches!(bytes[i - 1], b' ' | b'\t') => return Some(i),
                b'\'' if at_token_start => state = State::Single,
                b'"' if at_token_start => state = State::Double,
                _ => {}
            },
            State::Single => {
                if b == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 1;
                    } else {
                        state = State::Plain;
                    }
                }
            }
            State::Double => match b {
                b'\\' => i += 1,
                b'"' => state = State::Plain,
                _ => {}
            },
        }
        i += 1;
    }
    None
}
