#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod child;
mod class;
mod error;
mod property;
mod state;
mod tracker;
mod tracing_macros;
mod value;

pub use builder::{ObjectId, XmlBuilder};
pub use child::{XmlChildProperty, XmlChildPropertyBuilder};
pub use class::{ClassFn, ClassRef, Staged, XmlClass, XmlClassBuilder, XmlHooks, same_class};
pub use error::{ConfigError, Error, ValidationError};
pub use property::{DefaultProvider, SetConverter, Validator, ValueKind, XmlProperty, XmlPropertyBuilder};
pub use state::{SharedXmlApi, XmlState, xml_indent};
pub use tracker::{PropertyTracker, PropertyUse};
pub use value::Value;

pub use xmlbuilder_path::{Path, PathError};
pub use xmlbuilder_tree::{Namespaces, QEMU_NAMESPACE, XmlApi, XmlError, XmlErrorKind};
