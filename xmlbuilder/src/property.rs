//! Scalar property descriptors.
//!
//! A property maps one field of an object to one node (element text or
//! attribute) of the document. Reads come from the document until the field
//! is set; writes are stored and only reach the document at serialization.

use std::path::{Component, PathBuf};
use std::sync::Arc;

use xmlbuilder_path::Path;

use crate::builder::XmlBuilder;
use crate::value::{Value, parse_int};
use crate::{ConfigError, Error, ValidationError};

/// Checks a value before it is stored. `Err` carries the reason.
pub type Validator = Arc<dyn Fn(&XmlBuilder, Option<&Value>) -> Result<(), String> + Send + Sync>;

/// Computes the value of an unset field for build-mode objects.
pub type DefaultProvider = Arc<dyn Fn(&XmlBuilder) -> Option<Value> + Send + Sync>;

/// Transforms a value after the built-in conversions ran.
pub type SetConverter = Arc<dyn Fn(&XmlBuilder, Option<Value>) -> Option<Value> + Send + Sync>;

/// How document text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    /// Text passes through.
    #[default]
    Plain,
    /// Presence of the node means `true`.
    Bool,
    /// Decimal or `0x` hexadecimal integer.
    Int,
    /// `yes` / `no`.
    YesNo,
    /// `on` / `off`.
    OnOff,
}

/// Descriptor of one scalar field.
#[derive(Clone)]
pub struct XmlProperty {
    xpath: String,
    kind: ValueKind,
    do_abspath: bool,
    validate: Option<Validator>,
    default: Option<DefaultProvider>,
    default_name: Option<String>,
    set_converter: Option<SetConverter>,
    doc: Option<String>,
}

impl core::fmt::Debug for XmlProperty {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("XmlProperty")
            .field("xpath", &self.xpath)
            .field("kind", &self.kind)
            .field("default_name", &self.default_name)
            .finish_non_exhaustive()
    }
}

impl XmlProperty {
    /// Start declaring a property bound to `xpath`.
    pub fn builder(xpath: impl Into<String>) -> XmlPropertyBuilder {
        XmlPropertyBuilder {
            xpath: xpath.into(),
            kinds: Vec::new(),
            do_abspath: false,
            validate: None,
            default: None,
            default_name: None,
            set_converter: None,
            doc: None,
        }
    }

    /// The declared path, relative to the class root.
    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    /// The semantic type.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Documentation attached at declaration.
    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// The sentinel that stands for "use the default".
    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    pub(crate) fn has_default(&self) -> bool {
        self.default.is_some()
    }

    fn is_sentinel(&self, value: Option<&Value>) -> bool {
        match (&self.default_name, value) {
            (Some(name), Some(Value::Str(s))) => name == s,
            _ => false,
        }
    }

    /// The value an unset field takes in a build-mode object: the sentinel
    /// itself when one is declared, otherwise the provider's result.
    pub(crate) fn default_value(&self, obj: &XmlBuilder) -> Option<Value> {
        if let Some(name) = &self.default_name {
            return Some(Value::Str(name.clone()));
        }
        self.default.as_ref().and_then(|cb| cb(obj))
    }

    pub(crate) fn validate(
        &self,
        obj: &XmlBuilder,
        field: &str,
        value: Option<&Value>,
    ) -> Result<(), ValidationError> {
        match &self.validate {
            Some(cb) => cb(obj, value).map_err(|message| ValidationError {
                field: field.to_string(),
                message,
            }),
            None => Ok(()),
        }
    }

    /// Interpret a raw value according to the semantic type.
    pub(crate) fn convert_get(
        &self,
        field: &str,
        value: Option<Value>,
    ) -> Result<Option<Value>, Error> {
        if self.is_sentinel(value.as_ref()) {
            return Ok(value);
        }
        let Some(value) = value else {
            return Ok(match self.kind {
                ValueKind::Bool => Some(Value::Bool(false)),
                _ => None,
            });
        };
        Ok(Some(match self.kind {
            ValueKind::Plain => value,
            ValueKind::Bool => Value::Bool(value.is_truthy()),
            ValueKind::Int => Value::Int(to_int(field, &value)?),
            ValueKind::YesNo => Value::Bool(value.to_string() == "yes"),
            ValueKind::OnOff => Value::Bool(value.to_string() == "on"),
        }))
    }

    /// Apply the write-side conversions, in order: sentinel substitution,
    /// path normalization, semantic type, custom converter.
    pub(crate) fn convert_set(
        &self,
        obj: &XmlBuilder,
        field: &str,
        value: Option<Value>,
    ) -> Result<Option<Value>, Error> {
        let value = match value {
            v if self.is_sentinel(v.as_ref()) => self.default.as_ref().and_then(|cb| cb(obj)),
            Some(v) if self.do_abspath => Some(Value::Str(abspath(field, &v.to_string())?)),
            Some(v) if self.kind == ValueKind::OnOff => {
                Some(Value::from(if switch_is_on(&v, "off") { "on" } else { "off" }))
            }
            Some(v) if self.kind == ValueKind::YesNo => {
                Some(Value::from(if switch_is_on(&v, "no") { "yes" } else { "no" }))
            }
            Some(v) if self.kind == ValueKind::Int => Some(Value::Int(to_int(field, &v)?)),
            v => v,
        };
        Ok(match &self.set_converter {
            Some(cb) => cb(obj, value),
            None => value,
        })
    }
}

/// Truth of a value written to a switch field; the switch's own word for
/// false reads as false.
fn switch_is_on(value: &Value, off: &str) -> bool {
    match value {
        Value::Str(s) if s == off => false,
        v => v.is_truthy(),
    }
}

fn to_int(field: &str, value: &Value) -> Result<i64, Error> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Str(s) => parse_int(s).map_err(|e| {
            Error::Validation(ValidationError {
                field: field.to_string(),
                message: format!("'{s}' is not an integer: {e}"),
            })
        }),
    }
}

/// Make `path` absolute against the working directory and fold `.` and
/// `..` components lexically.
fn abspath(field: &str, path: &str) -> Result<String, Error> {
    let absolute = std::path::absolute(path).map_err(|e| {
        Error::Validation(ValidationError {
            field: field.to_string(),
            message: format!("cannot make '{path}' absolute: {e}"),
        })
    })?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    Ok(normalized.to_string_lossy().into_owned())
}

/// Builder for [`XmlProperty`].
pub struct XmlPropertyBuilder {
    xpath: String,
    kinds: Vec<ValueKind>,
    do_abspath: bool,
    validate: Option<Validator>,
    default: Option<DefaultProvider>,
    default_name: Option<String>,
    set_converter: Option<SetConverter>,
    doc: Option<String>,
}

impl XmlPropertyBuilder {
    /// Node presence is the value.
    pub fn is_bool(mut self) -> Self {
        self.kinds.push(ValueKind::Bool);
        self
    }

    /// The value is an integer.
    pub fn is_int(mut self) -> Self {
        self.kinds.push(ValueKind::Int);
        self
    }

    /// The value is written `yes`/`no`. Setting the text `"no"` writes
    /// `no`; any other value follows its truthiness.
    pub fn is_yesno(mut self) -> Self {
        self.kinds.push(ValueKind::YesNo);
        self
    }

    /// The value is written `on`/`off`. Setting the text `"off"` writes
    /// `off`; any other value follows its truthiness.
    pub fn is_onoff(mut self) -> Self {
        self.kinds.push(ValueKind::OnOff);
        self
    }

    /// Normalize set values to absolute filesystem paths.
    pub fn do_abspath(mut self) -> Self {
        self.do_abspath = true;
        self
    }

    /// Reject bad values before they are stored.
    pub fn validate_cb<F>(mut self, f: F) -> Self
    where
        F: Fn(&XmlBuilder, Option<&Value>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    /// Value of the field in build-mode objects until it is set.
    pub fn default_cb<F>(mut self, f: F) -> Self
    where
        F: Fn(&XmlBuilder) -> Option<Value> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(f));
        self
    }

    /// A value that, when set, means "use the default provider instead".
    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Post-process set values.
    pub fn set_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&XmlBuilder, Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.set_converter = Some(Arc::new(f));
        self
    }

    /// Attach documentation.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Check the declaration and produce the descriptor.
    pub fn build(self) -> Result<XmlProperty, ConfigError> {
        if self.xpath.is_empty() {
            return Err(ConfigError::EmptyXpath);
        }
        Path::parse(&self.xpath).map_err(|source| ConfigError::MalformedPath {
            xpath: self.xpath.clone(),
            source,
        })?;

        let mut kinds = self.kinds.clone();
        kinds.dedup();
        if kinds.len() > 1 {
            return Err(ConfigError::ConflictingConverters { xpath: self.xpath });
        }
        if self.default_name.is_some() && self.default.is_none() {
            return Err(ConfigError::SentinelWithoutDefault { xpath: self.xpath });
        }

        Ok(XmlProperty {
            xpath: self.xpath,
            kind: kinds.first().copied().unwrap_or_default(),
            do_abspath: self.do_abspath,
            validate: self.validate,
            default: self.default,
            default_name: self.default_name,
            set_converter: self.set_converter,
            doc: self.doc,
        })
    }
}
