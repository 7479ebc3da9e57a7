//! Placeholder syntax: `${name[filter]|delimiter}`.
//!
//! A template is a sequence of literal spans and variable references.
//! [`parse`] walks the template lazily; the walk is a pure function of the
//! input, so a template can be re-parsed any number of times.
//!
//! Unbalanced delimiters are never an error: `${foo` is literal text.
//! Only a malformed subscript inside a closed reference is reported.

use serde::Serialize;

use crate::error::SyntaxError;

/// Opening delimiter of a variable reference.
pub const SYNTAX_PREFIX: &str = "${";
/// Closing delimiter of a variable reference.
pub const SYNTAX_SUFFIX: char = '}';
/// Joins the values of a multi-valued variable when no delimiter is given.
pub const DEFAULT_MV_DELIMITER: &str = ", ";

/// Element selection applied to a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    /// `${foo[2]}` -- a single 0-based element.
    Index { index: usize },
    /// `${foo[1-3]}` -- a 0-based inclusive range.
    Range { start: usize, end: usize },
}

/// A parsed `${...}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableReference {
    /// The dotted variable name, trimmed, with filter and delimiter removed.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// `Some("")` for `${foo|}`, `None` when no `|` was present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
}

impl VariableReference {
    /// A bare reference with no filter and no delimiter.
    pub fn named(name: impl Into<String>) -> Self {
        VariableReference {
            name: name.into(),
            filter: None,
            delimiter: None,
        }
    }

    /// Parse the text between `${` and `}`.
    ///
    /// Returns `Ok(None)` when the body names nothing (`${}`, `${ |x}`) or
    /// has an unclosed subscript (`${foo[1}`), which callers render as
    /// literal text.
    pub fn parse_body(body: &str) -> Result<Option<VariableReference>, SyntaxError> {
        let body = body.trim();
        let (name_part, delimiter) = match body.split_once('|') {
            Some((name, delim)) => (name.trim(), Some(delim.to_string())),
            None => (body, None),
        };

        let (name, filter) = match name_part.find('[') {
            None => (name_part, None),
            Some(open) => {
                let name = name_part[..open].trim();
                let rest = &name_part[open + 1..];
                // `${foo[1}` is unbalanced, so the whole reference stays literal
                let Some(inner) = rest.strip_suffix(']') else {
                    return Ok(None);
                };
                (name, Some(parse_filter(name, inner.trim())?))
            }
        };

        if name.is_empty() {
            return Ok(None);
        }

        Ok(Some(VariableReference {
            name: name.to_string(),
            filter,
            delimiter,
        }))
    }
}

fn parse_filter(name: &str, subscript: &str) -> Result<Filter, SyntaxError> {
    if let Some(index) = parse_index(subscript) {
        return Ok(Filter::Index { index });
    }
    if subscript.starts_with('-') {
        return Err(SyntaxError::NegativeSubscript {
            name: name.to_string(),
            subscript: subscript.to_string(),
        });
    }
    if let Some((start, end)) = subscript.split_once('-') {
        if let (Some(start), Some(end)) = (parse_index(start.trim()), parse_index(end.trim())) {
            if start > end {
                return Err(SyntaxError::InvertedRange {
                    name: name.to_string(),
                    start,
                    end,
                });
            }
            return Ok(Filter::Range { start, end });
        }
    }
    Err(SyntaxError::NonNumericSubscript {
        name: name.to_string(),
        subscript: subscript.to_string(),
    })
}

fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Reference(VariableReference),
}

/// Lazy walk over a template. Created by [`parse`].
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    src: &'a str,
    pos: usize,
}

/// Parse a template into literal spans and references.
pub fn parse(src: &str) -> Segments<'_> {
    Segments { src, pos: 0 }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Result<Segment<'a>, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.src[self.pos..];
        if rest.is_empty() {
            return None;
        }

        let Some(open) = rest.find(SYNTAX_PREFIX) else {
            self.pos = self.src.len();
            return Some(Ok(Segment::Literal(rest)));
        };
        if open > 0 {
            self.pos += open;
            return Some(Ok(Segment::Literal(&rest[..open])));
        }

        let body_start = SYNTAX_PREFIX.len();
        let Some(close) = rest[body_start..].find(SYNTAX_SUFFIX) else {
            // Unterminated: the remainder is literal
            self.pos = self.src.len();
            return Some(Ok(Segment::Literal(rest)));
        };
        let body = &rest[body_start..body_start + close];

        // `${a ${b}`: the outer opener is literal, the inner one is a reference
        if let Some(inner) = body.find(SYNTAX_PREFIX) {
            let literal_len = body_start + inner;
            self.pos += literal_len;
            return Some(Ok(Segment::Literal(&rest[..literal_len])));
        }

        let whole_len = body_start + close + SYNTAX_SUFFIX.len_utf8();
        self.pos += whole_len;
        match VariableReference::parse_body(body) {
            Ok(Some(reference)) => Some(Ok(Segment::Reference(reference))),
            Ok(None) => Some(Ok(Segment::Literal(&rest[..whole_len]))),
            Err(e) => Some(Err(e)),
        }
    }
}

/// If `src` is exactly one reference with no surrounding text, return it.
///
/// Callers use this to resolve a value without stringifying it.
pub fn single_reference(src: &str) -> Result<Option<VariableReference>, SyntaxError> {
    let mut segments = parse(src);
    let first = match segments.next() {
        Some(Ok(Segment::Reference(r))) => r,
        Some(Err(e)) => return Err(e),
        _ => return Ok(None),
    };
    if segments.next().is_some() {
        return Ok(None);
    }
    Ok(Some(first))
}

/// Names of every variable referenced by `src`, in order of appearance.
pub fn referenced_names(src: &str) -> Result<Vec<String>, SyntaxError> {
    let mut names = Vec::new();
    for segment in parse(src) {
        if let Segment::Reference(r) = segment? {
            names.push(r.name);
        }
    }
    Ok(names)
}

/// True when `src` contains at least one well-formed reference.
pub fn is_any_variable_referenced(src: &str) -> bool {
    parse(src).any(|s| matches!(s, Ok(Segment::Reference(_))))
}
