#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

use core::fmt;
use core::str::FromStr;

mod error;
pub use error::PathError;

/// The bracketed condition attached to a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `[@attribute='value']`: only nodes carrying that attribute value match.
    Equals {
        /// Attribute name, without the leading `@`.
        attribute: String,
        /// Expected value, without quotes.
        value: String,
    },
    /// `[n]`: the n-th match (1-based) among the siblings selected by the segment.
    Position(usize),
}

/// One `/`-separated step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    raw: String,
    name: String,
    namespace: Option<String>,
    is_attribute: bool,
    condition: Option<Condition>,
}

impl Segment {
    /// Parse a single segment.
    ///
    /// This never fails: malformed conditions degrade to "no condition", the
    /// same way a missing predicate value does.
    pub fn parse(raw: &str) -> Self {
        let (head, condition) = match raw.split_once('[') {
            Some((head, rest)) => (head, parse_condition(rest)),
            None => (raw, None),
        };

        let (is_attribute, head) = match head.strip_prefix('@') {
            Some(rest) => (true, rest),
            None => (false, head),
        };

        let (namespace, name) = match head.split_once(':') {
            Some((ns, name)) => (Some(ns.to_string()), name),
            None => (None, head),
        };

        Self {
            raw: raw.to_string(),
            name: name.to_string(),
            namespace,
            is_attribute,
            condition,
        }
    }

    /// The segment exactly as written.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Local node name (no prefix, no `@`, no condition).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace prefix, if the segment was written as `ns:name`.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Name including the namespace prefix, as it would appear in a tag.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// True for `@name` segments.
    pub fn is_attribute(&self) -> bool {
        self.is_attribute
    }

    /// The bracketed condition, if any.
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// The `(attribute, value)` pair of an equality predicate.
    pub fn predicate(&self) -> Option<(&str, &str)> {
        match &self.condition {
            Some(Condition::Equals { attribute, value }) => Some((attribute, value)),
            _ => None,
        }
    }

    /// The 1-based position of a `[n]` segment.
    pub fn position(&self) -> Option<usize> {
        match self.condition {
            Some(Condition::Position(n)) => Some(n),
            _ => None,
        }
    }

    /// True for the `.` context-node segment.
    pub fn is_context(&self) -> bool {
        !self.is_attribute && self.namespace.is_none() && self.name == "."
    }

    /// True for the empty segment produced by a leading `/`.
    pub fn is_document(&self) -> bool {
        self.raw.is_empty()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_condition(rest: &str) -> Option<Condition> {
    let inner = rest.trim_end_matches(']');

    if let Some((attribute, value)) = inner.split_once('=') {
        let attribute = attribute.trim().trim_start_matches('@');
        let value = value.trim();
        if attribute.is_empty() || value.is_empty() {
            return None;
        }
        return Some(Condition::Equals {
            attribute: attribute.to_string(),
            value: value.trim_matches(|c| c == '\'' || c == '"').to_string(),
        });
    }

    inner.trim().parse::<usize>().ok().map(Condition::Position)
}

/// A parsed path: an ordered, non-empty list of [`Segment`]s.
///
/// The first segment addresses the starting point: `.` is the context node
/// (the document's root element), an empty segment (from a leading `/`) is
/// the document itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    raw: String,
    segments: Vec<Segment>,
}

impl Path {
    /// Parse a path expression.
    ///
    /// Only structurally empty segments are rejected (`./a//b`, `./a/`, `@`).
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::Empty);
        }

        let pieces = split_segments(text);
        let mut segments = Vec::with_capacity(pieces.len());
        for (position, piece) in pieces.into_iter().enumerate() {
            // A leading "/" is the only place an empty segment is allowed.
            if piece.is_empty() && position == 0 {
                segments.push(Segment::parse(piece));
                continue;
            }

            let segment = Segment::parse(piece);
            if segment.name.is_empty() {
                return Err(PathError::EmptySegment {
                    path: text.to_string(),
                    position,
                });
            }
            segments.push(segment);
        }

        if segments.len() == 1 && segments[0].is_document() {
            return Err(PathError::EmptySegment {
                path: text.to_string(),
                position: 1,
            });
        }

        Ok(Self {
            raw: text.to_string(),
            segments,
        })
    }

    /// The path exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// All segments, first to last.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The final segment.
    pub fn target(&self) -> &Segment {
        // parse() guarantees at least one segment
        &self.segments[self.segments.len() - 1]
    }

    /// True if the path starts with `/`.
    pub fn is_absolute(&self) -> bool {
        self.segments[0].is_document()
    }

    /// The path with its last segment dropped, or `None` when nothing
    /// addressable is left.
    pub fn parent(&self) -> Option<Path> {
        if self.segments.len() < 2 {
            return None;
        }
        let segments = self.segments[..self.segments.len() - 1].to_vec();
        let raw = segments
            .iter()
            .map(Segment::raw)
            .collect::<Vec<_>>()
            .join("/");
        if raw.is_empty() {
            return None;
        }
        Some(Self { raw, segments })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Split on `/`, ignoring separators inside `[...]` or quotes.
fn split_segments(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (idx, ch) in text.char_indices() {
        match (ch, quote) {
            ('\'' | '"', None) if depth > 0 => quote = Some(ch),
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('[', None) => depth += 1,
            (']', None) => depth = depth.saturating_sub(1),
            ('/', None) if depth == 0 => {
                pieces.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_ignores_slashes_in_predicates() {
        assert_eq!(
            split_segments("./source[@dir='/var/lib']/x"),
            vec![".", "source[@dir='/var/lib']", "x"]
        );
    }

    #[test]
    fn leading_slash_yields_document_segment() {
        assert_eq!(split_segments("/domain/name"), vec!["", "domain", "name"]);
    }

    #[test]
    fn condition_without_value_is_dropped() {
        assert_eq!(parse_condition("@type=]"), None);
        assert_eq!(parse_condition("foo]"), None);
    }

    #[test]
    fn condition_accepts_double_quotes() {
        assert_eq!(
            parse_condition("@type=\"pty\"]"),
            Some(Condition::Equals {
                attribute: "type".into(),
                value: "pty".into()
            })
        );
    }
}
