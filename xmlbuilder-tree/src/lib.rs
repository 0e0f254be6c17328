#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod document;
mod error;
mod escaping;
mod namespaces;
mod node;
mod parser;
mod serializer;
mod tracing_macros;

pub use api::XmlApi;
pub use document::Document;
pub use error::{XmlError, XmlErrorKind};
pub use escaping::{EscapingWriter, escape_text};
pub use namespaces::{Namespaces, QEMU_NAMESPACE};
pub use node::{Element, NodeRef, XmlNode};

// Node handles are indextree ids.
pub use indextree::NodeId;
