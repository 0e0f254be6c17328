//! Errors raised while declaring classes and while binding objects to XML.

use std::error::Error as StdError;
use std::fmt::{self, Display};

use xmlbuilder_path::PathError;
use xmlbuilder_tree::XmlError;

/// Any failure of an xmlbuilder operation.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A class or property declaration is inconsistent. This is a bug in the
    /// declaring code, not in the data.
    Config(ConfigError),
    /// Source text could not be parsed. The error carries the text.
    Parse(XmlError),
    /// A validator rejected a value; nothing was changed.
    Validation(ValidationError),
    /// The document tree refused an edit.
    Tree(XmlError),
}

impl Error {
    /// Returns an error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "xmlbuilder::config",
            Error::Parse(_) => "xmlbuilder::parse",
            Error::Validation(_) => "xmlbuilder::validation",
            Error::Tree(e) => e.kind().code(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "programming error: {e}"),
            Error::Parse(e) => write!(f, "{e}"),
            Error::Validation(e) => write!(f, "{e}"),
            Error::Tree(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            Error::Parse(e) | Error::Tree(e) => Some(e),
            Error::Validation(e) => Some(e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(value: ConfigError) -> Self {
        Error::Config(value)
    }
}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        Error::Validation(value)
    }
}

impl From<XmlError> for Error {
    fn from(value: XmlError) -> Self {
        Error::Tree(value)
    }
}

impl miette::Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(Error::code(self)))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Error::Parse(e) | Error::Tree(e) => miette::Diagnostic::source_code(e),
            _ => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        match self {
            Error::Parse(e) | Error::Tree(e) => miette::Diagnostic::labels(e),
            _ => None,
        }
    }
}

/// A validator rejected the value offered for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field being set.
    pub field: String,
    /// The validator's explanation.
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for '{}': {}", self.field, self.message)
    }
}

impl StdError for ValidationError {}

/// Inconsistent class or property declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// More than one of bool/int/yesno/onoff was requested.
    ConflictingConverters {
        /// Property path.
        xpath: String,
    },
    /// A default sentinel was declared without a default provider.
    SentinelWithoutDefault {
        /// Property path.
        xpath: String,
    },
    /// A property was declared with an empty path.
    EmptyXpath,
    /// A singleton child property names more than one class.
    MultipleClassesOnSingleton {
        /// Child property path.
        xpath: String,
    },
    /// `prop_order` names something that is not a field.
    UnknownPropOrderKey {
        /// Class root name.
        class: String,
        /// The offending key.
        key: String,
    },
    /// A field name that the class does not declare.
    UnknownField {
        /// Class root name.
        class: String,
        /// The requested field.
        field: String,
    },
    /// No child property of the parent accepts this class.
    ChildClassNotDeclared {
        /// Parent class root name.
        class: String,
        /// Child class root name.
        child: String,
    },
    /// The same field name was declared twice.
    DuplicateField {
        /// Class root name.
        class: String,
        /// The duplicated name.
        field: String,
    },
    /// A declared path does not parse.
    MalformedPath {
        /// The declared path.
        xpath: String,
        /// Why it does not parse.
        source: PathError,
    },
    /// A namespace prefix is used but never registered.
    UnknownNamespacePrefix {
        /// Class root name.
        class: String,
        /// The prefix.
        prefix: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ConflictingConverters { xpath } => {
                write!(f, "conflicting converter options on property '{xpath}'")
            }
            ConfigError::SentinelWithoutDefault { xpath } => {
                write!(f, "property '{xpath}' has a default name but no default provider")
            }
            ConfigError::EmptyXpath => write!(f, "property declared without an xpath"),
            ConfigError::MultipleClassesOnSingleton { xpath } => {
                write!(f, "singleton child property '{xpath}' lists several classes")
            }
            ConfigError::UnknownPropOrderKey { class, key } => {
                write!(f, "prop_order key '{key}' of <{class}> is not a property")
            }
            ConfigError::UnknownField { class, field } => {
                write!(f, "<{class}> has no field '{field}'")
            }
            ConfigError::ChildClassNotDeclared { class, child } => {
                write!(f, "<{class}> has no child property for <{child}>")
            }
            ConfigError::DuplicateField { class, field } => {
                write!(f, "<{class}> declares field '{field}' twice")
            }
            ConfigError::MalformedPath { xpath, source } => {
                write!(f, "malformed path '{xpath}': {source}")
            }
            ConfigError::UnknownNamespacePrefix { class, prefix } => {
                write!(f, "<{class}> uses unregistered namespace prefix '{prefix}'")
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::MalformedPath { source, .. } => Some(source),
            _ => None,
        }
    }
}
