//! Class declarations: the accessor table of one kind of object.
//!
//! A class is declared once, usually in a `static` initialized through
//! `LazyLock`, and referenced as `&'static XmlClass` from then on:
//!
//! ```
//! use std::sync::LazyLock;
//! use xmlbuilder::{XmlClass, XmlProperty};
//!
//! static CPU: LazyLock<XmlClass> = LazyLock::new(|| {
//!     XmlClass::builder("cpu")
//!         .property("mode", XmlProperty::builder("./@mode"))
//!         .property("model", XmlProperty::builder("./model"))
//!         .prop_order(&["mode", "model"])
//!         .build()
//!         .expect("cpu class")
//! });
//! ```

use std::any::Any;
use std::sync::Arc;

use indexmap::IndexMap;
use xmlbuilder_tree::Namespaces;

use crate::builder::XmlBuilder;
use crate::child::{XmlChildProperty, XmlChildPropertyBuilder};
use crate::property::{XmlProperty, XmlPropertyBuilder};
use crate::{ConfigError, Error};

/// A declared class.
pub type ClassRef = &'static XmlClass;

/// Deferred class reference, so classes can name each other (or themselves)
/// as children.
pub type ClassFn = fn() -> ClassRef;

/// True if both references denote the same class.
pub fn same_class(a: ClassRef, b: ClassRef) -> bool {
    core::ptr::eq(a, b)
}

/// Data staged by [`XmlHooks::prepare_serialize`].
pub type Staged = Option<Box<dyn Any>>;

/// Per-class lifecycle hooks. Every method has a no-op default.
pub trait XmlHooks: Send + Sync {
    /// Runs before serialization. Whatever it returns is handed to
    /// [`finish_serialize`](Self::finish_serialize).
    fn prepare_serialize(&self, _obj: &mut XmlBuilder) -> Result<Staged, Error> {
        Ok(None)
    }

    /// Runs after serialization, whether it succeeded or not.
    fn finish_serialize(&self, _obj: &mut XmlBuilder, _staged: Staged) {}

    /// Check the object as a whole.
    fn validate(&self, _obj: &XmlBuilder) -> Result<(), Error> {
        Ok(())
    }

    /// Fill in values that depend on the rest of the object graph.
    fn set_defaults(&self, _obj: &mut XmlBuilder) -> Result<(), Error> {
        Ok(())
    }
}

/// Declaration of one kind of object.
pub struct XmlClass {
    root_name: String,
    properties: IndexMap<String, XmlProperty>,
    children: IndexMap<String, XmlChildProperty>,
    prop_order: Vec<String>,
    namespaces: Namespaces,
    sanitize: bool,
    hooks: Option<Arc<dyn XmlHooks>>,
}

impl core::fmt::Debug for XmlClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("XmlClass")
            .field("root_name", &self.root_name)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl XmlClass {
    /// Start declaring a class whose root element is `root_name`.
    pub fn builder(root_name: impl Into<String>) -> XmlClassBuilder {
        XmlClassBuilder {
            root_name: root_name.into(),
            properties: Vec::new(),
            children: Vec::new(),
            prop_order: Vec::new(),
            namespaces: Namespaces::default(),
            sanitize: false,
            hooks: None,
        }
    }

    /// Root element name, possibly prefixed.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Scalar properties in declaration order.
    pub fn properties(&self) -> &IndexMap<String, XmlProperty> {
        &self.properties
    }

    /// A scalar property by field name.
    pub fn property(&self, name: &str) -> Option<&XmlProperty> {
        self.properties.get(name)
    }

    /// Child properties in declaration order.
    pub fn children(&self) -> &IndexMap<String, XmlChildProperty> {
        &self.children
    }

    /// A child property by field name.
    pub fn child(&self, name: &str) -> Option<&XmlChildProperty> {
        self.children.get(name)
    }

    /// Fields serialized first, in this order.
    pub fn prop_order(&self) -> &[String] {
        &self.prop_order
    }

    /// Namespace prefixes this class may use.
    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// True if source text is reduced to printable ASCII before parsing.
    pub fn sanitize(&self) -> bool {
        self.sanitize
    }

    pub(crate) fn hooks(&self) -> Option<&Arc<dyn XmlHooks>> {
        self.hooks.as_ref()
    }

    pub(crate) fn unknown_field(&self, field: &str) -> ConfigError {
        ConfigError::UnknownField {
            class: self.root_name.clone(),
            field: field.to_string(),
        }
    }
}

enum PendingProperty {
    Built(XmlProperty),
    Builder(XmlPropertyBuilder),
}

enum PendingChild {
    Built(XmlChildProperty),
    Builder(XmlChildPropertyBuilder),
}

/// Builder for [`XmlClass`].
pub struct XmlClassBuilder {
    root_name: String,
    properties: Vec<(String, PendingProperty)>,
    children: Vec<(String, PendingChild)>,
    prop_order: Vec<String>,
    namespaces: Namespaces,
    sanitize: bool,
    hooks: Option<Arc<dyn XmlHooks>>,
}

impl XmlClassBuilder {
    /// Declare a scalar field.
    pub fn property(mut self, name: impl Into<String>, property: XmlPropertyBuilder) -> Self {
        self.properties
            .push((name.into(), PendingProperty::Builder(property)));
        self
    }

    /// Declare a scalar field from an already built descriptor.
    pub fn built_property(mut self, name: impl Into<String>, property: XmlProperty) -> Self {
        self.properties
            .push((name.into(), PendingProperty::Built(property)));
        self
    }

    /// Declare a child field.
    pub fn child(mut self, name: impl Into<String>, child: XmlChildPropertyBuilder) -> Self {
        self.children.push((name.into(), PendingChild::Builder(child)));
        self
    }

    /// Declare a child field from an already built descriptor.
    pub fn built_child(mut self, name: impl Into<String>, child: XmlChildProperty) -> Self {
        self.children.push((name.into(), PendingChild::Built(child)));
        self
    }

    /// Fields to serialize first, in this order.
    pub fn prop_order(mut self, order: &[&str]) -> Self {
        self.prop_order = order.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Register a namespace prefix for paths and the root element.
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.register(prefix, uri);
        self
    }

    /// Strip non-printable characters from source text before parsing.
    pub fn sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Attach lifecycle hooks.
    pub fn hooks(mut self, hooks: impl XmlHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// Check the declaration and produce the class.
    pub fn build(self) -> Result<XmlClass, ConfigError> {
        let class = self.root_name.clone();
        let duplicate = |field: &str| ConfigError::DuplicateField {
            class: class.clone(),
            field: field.to_string(),
        };

        let mut properties = IndexMap::new();
        for (name, pending) in self.properties {
            let property = match pending {
                PendingProperty::Built(p) => p,
                PendingProperty::Builder(b) => b.build()?,
            };
            if properties.contains_key(&name) {
                return Err(duplicate(&name));
            }
            properties.insert(name, property);
        }

        let mut children = IndexMap::new();
        for (name, pending) in self.children {
            let child = match pending {
                PendingChild::Built(c) => c,
                PendingChild::Builder(b) => b.build()?,
            };
            if properties.contains_key(&name) || children.contains_key(&name) {
                return Err(duplicate(&name));
            }
            for param in child.params() {
                if !properties.contains_key(param) {
                    return Err(ConfigError::UnknownField {
                        class: class.clone(),
                        field: param.clone(),
                    });
                }
            }
            children.insert(name, child);
        }

        for key in &self.prop_order {
            if !properties.contains_key(key) && !children.contains_key(key) {
                return Err(ConfigError::UnknownPropOrderKey {
                    class: class.clone(),
                    key: key.clone(),
                });
            }
        }

        if let Some((prefix, _)) = self.root_name.split_once(':')
            && self.namespaces.uri(prefix).is_none()
        {
            return Err(ConfigError::UnknownNamespacePrefix {
                class,
                prefix: prefix.to_string(),
            });
        }

        Ok(XmlClass {
            root_name: self.root_name,
            properties,
            children,
            prop_order: self.prop_order,
            namespaces: self.namespaces,
            sanitize: self.sanitize,
            hooks: self.hooks,
        })
    }
}
