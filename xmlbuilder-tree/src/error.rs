//! Error types for parsing and editing XML documents.

use std::error::Error;
use std::fmt::{self, Display};

use miette::SourceSpan;
use xmlbuilder_path::PathError;

/// Error raised by the document tree.
#[derive(Debug)]
pub struct XmlError {
    pub(crate) kind: XmlErrorKind,
    pub(crate) source_code: Option<String>,
    pub(crate) span: Option<SourceSpan>,
}

impl XmlError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &XmlErrorKind {
        &self.kind
    }

    /// The XML text the error was raised against, if any.
    pub fn input(&self) -> Option<&str> {
        self.source_code.as_deref()
    }

    /// Byte span of the offending input, if known.
    pub fn span(&self) -> Option<SourceSpan> {
        self.span
    }

    /// Create a new error with the given kind.
    pub fn new(kind: impl Into<XmlErrorKind>) -> Self {
        XmlError {
            kind: kind.into(),
            source_code: None,
            span: None,
        }
    }

    /// Attach source code to this error for diagnostics.
    pub(crate) fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_code = Some(source.into());
        self
    }

    /// Attach a span to this error for diagnostics.
    pub(crate) fn with_span(mut self, span: impl Into<SourceSpan>) -> Self {
        self.span = Some(span.into());
        self
    }
}

impl Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error for XmlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            XmlErrorKind::Path(e) => Some(e),
            _ => None,
        }
    }
}

impl From<XmlErrorKind> for XmlError {
    fn from(value: XmlErrorKind) -> Self {
        XmlError::new(value)
    }
}

impl From<PathError> for XmlError {
    fn from(value: PathError) -> Self {
        XmlError::new(XmlErrorKind::Path(value))
    }
}

/// Detailed classification of tree errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum XmlErrorKind {
    /// The XML text is not well formed.
    Parse(String),
    /// Input ended with elements still open.
    UnexpectedEof,
    /// The document has no root element.
    NoRootElement,
    /// A second top-level element was found.
    MultipleRoots(String),
    /// Character data outside the root element.
    ContentOutsideRoot,
    /// A path expression could not be parsed.
    Path(PathError),
    /// A namespace prefix is neither registered nor declared.
    UnknownNamespace(String),
    /// An operation needed a root element and there is none.
    MissingRoot,
    /// A node handle no longer points at a live node.
    StaleNode,
}

impl XmlErrorKind {
    /// Returns an error code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            XmlErrorKind::Parse(_) => "xml::parse",
            XmlErrorKind::UnexpectedEof => "xml::unexpected_eof",
            XmlErrorKind::NoRootElement => "xml::no_root_element",
            XmlErrorKind::MultipleRoots(_) => "xml::multiple_roots",
            XmlErrorKind::ContentOutsideRoot => "xml::content_outside_root",
            XmlErrorKind::Path(_) => "xml::path",
            XmlErrorKind::UnknownNamespace(_) => "xml::unknown_namespace",
            XmlErrorKind::MissingRoot => "xml::missing_root",
            XmlErrorKind::StaleNode => "xml::stale_node",
        }
    }
}

impl Display for XmlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XmlErrorKind::Parse(msg) => write!(f, "XML parse error: {msg}"),
            XmlErrorKind::UnexpectedEof => write!(f, "unexpected end of XML input"),
            XmlErrorKind::NoRootElement => write!(f, "document has no root element"),
            XmlErrorKind::MultipleRoots(name) => {
                write!(f, "extra content at the end of the document: <{name}>")
            }
            XmlErrorKind::ContentOutsideRoot => {
                write!(f, "text content outside of the root element")
            }
            XmlErrorKind::Path(e) => write!(f, "invalid path: {e}"),
            XmlErrorKind::UnknownNamespace(prefix) => {
                write!(f, "unknown namespace prefix '{prefix}'")
            }
            XmlErrorKind::MissingRoot => write!(f, "document has no root element to edit"),
            XmlErrorKind::StaleNode => write!(f, "node is no longer part of the document"),
        }
    }
}

impl miette::Diagnostic for XmlError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_code
            .as_ref()
            .map(|s| s as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        let span = self.span?;
        let label = match &self.kind {
            XmlErrorKind::MultipleRoots(name) => format!("second root element `{name}`"),
            XmlErrorKind::ContentOutsideRoot => "text outside the root".to_string(),
            _ => "error occurred here".to_string(),
        };
        Some(Box::new(std::iter::once(miette::LabeledSpan::at(
            span, label,
        ))))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        match &self.kind {
            XmlErrorKind::UnknownNamespace(_) => Some(Box::new(
                "register the prefix with Namespaces::register before using it in a path",
            )),
            _ => None,
        }
    }
}
