// File: src/interpolation.rs
//
// Splits the raw body of a print string literal into plain text and `{expr}`
// placeholders. Escape sequences are decoded here rather than in the lexer so
// that `\{` and `\}` can stand for literal braces.

use crate::errors::{CalcError, CalcResult, SourceLocation};
use once_cell::sync::Lazy;
use regex::Regex;

static SEGMENT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)(?P<escape>\\.)|(?P<dangling>\\$)|\{(?P<expr>[^{}]*)\}|(?P<text>[^\\{}]+)|(?P<brace>[{}])",
    )
    .expect("segment pattern is a valid regex")
});

/// One piece of an interpolated string
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    /// Placeholder expression, braces and surrounding blanks stripped.
    /// `offset` is the byte offset of `source` within the raw literal.
    Expr { source: String, offset: usize },
}

/// Decode a single escaped character; unknown escapes are kept as written.
fn unescape(c: char, out: &mut String) {
    match c {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        '\\' | '"' | '{' | '}' => out.push(c),
        _ => {
            out.push('\\');
            out.push(c);
        }
    }
}

/// Split `raw` into segments. Neighbouring text and escapes are merged, so the
/// result never holds two `Text` segments in a row.
pub fn split(raw: &str, location: &SourceLocation) -> CalcResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();

    for caps in SEGMENT_PATTERN.captures_iter(raw) {
        if let Some(escape) = caps.name("escape") {
            if let Some(c) = escape.as_str().chars().nth(1) {
                unescape(c, &mut text);
            }
        } else if caps.name("dangling").is_some() {
            return Err(CalcError::parse_error("String ends with a lone '\\'", location.clone()));
        } else if let Some(expr) = caps.name("expr") {
            let body = expr.as_str().trim();
            let offset = expr.start() + (expr.as_str().len() - expr.as_str().trim_start().len());
            if body.is_empty() {
                return Err(CalcError::parse_error("Empty '{}' placeholder in string", location.clone())
                    .with_help("write '\\{' and '\\}' for literal braces".to_string()));
            }
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Expr { source: body.to_string(), offset });
        } else if let Some(chunk) = caps.name("text") {
            text.push_str(chunk.as_str());
        } else if let Some(brace) = caps.name("brace") {
            return Err(CalcError::parse_error(
                format!("Unbalanced '{}' in string", brace.as_str()),
                location.clone(),
            )
            .with_help("write '\\{' and '\\}' for literal braces".to_string()));
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }

    Ok(segments)
}
