//! Errors produced while parsing a path expression.

use core::fmt;

/// Error returned by [`Path::parse`](crate::Path::parse).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathError {
    /// The expression was the empty string.
    Empty,

    /// A segment that must name a node was empty, as in `./a//b` or `./a/@`.
    EmptySegment {
        /// The full expression.
        path: String,
        /// Index of the offending segment (0-based).
        position: usize,
    },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => write!(f, "empty path expression"),
            PathError::EmptySegment { path, position } => {
                write!(f, "empty segment {position} in path '{path}'")
            }
        }
    }
}

impl std::error::Error for PathError {}
