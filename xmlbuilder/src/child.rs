//! Child property descriptors: where nested objects live.

use crate::builder::XmlBuilder;
use crate::class::{ClassFn, ClassRef, same_class};
use crate::{ConfigError, Error};

/// Descriptor of a nested object (singleton) or of a collection of them.
///
/// The child's location is `relative_xpath/<child root name>`. The relative
/// path may reference sibling fields as `%(field)s`; they are substituted
/// with the owner's current values.
#[derive(Debug, Clone)]
pub struct XmlChildProperty {
    classes: Vec<ClassFn>,
    relative_xpath: String,
    params: Vec<String>,
    is_single: bool,
}

impl XmlChildProperty {
    /// Start declaring a child property accepting `classes`, in priority
    /// order.
    pub fn builder(classes: &[ClassFn]) -> XmlChildPropertyBuilder {
        XmlChildPropertyBuilder {
            classes: classes.to_vec(),
            relative_xpath: ".".to_string(),
            is_single: false,
        }
    }

    /// Accepted classes, highest priority first.
    pub fn classes(&self) -> impl Iterator<Item = ClassRef> + '_ {
        self.classes.iter().map(|f| f())
    }

    /// The first declared class.
    pub fn primary_class(&self) -> ClassRef {
        // the builder refuses an empty class list
        (self.classes[0])()
    }

    /// Relative path template.
    pub fn relative_xpath(&self) -> &str {
        &self.relative_xpath
    }

    /// True for a singleton child.
    pub fn is_single(&self) -> bool {
        self.is_single
    }

    /// Names of the sibling fields the path template references.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Priority of `class` among the accepted classes.
    pub(crate) fn class_index(&self, class: ClassRef) -> Option<usize> {
        self.classes().position(|c| same_class(c, class))
    }

    /// Location of a `class` child inside `owner`, parameters substituted.
    pub(crate) fn resolve_xpath(&self, owner: &XmlBuilder, class: ClassRef) -> Result<String, Error> {
        let template = format!("{}/{}", self.relative_xpath, class.root_name());
        interpolate(&template, &self.params, |name| {
            Ok(owner.get(name)?.map(|v| v.to_string()).unwrap_or_default())
        })
    }

    /// Insert `child` keeping the collection ordered by class priority;
    /// children of equal priority stay in insertion order.
    pub(crate) fn append(&self, list: &mut Vec<XmlBuilder>, child: XmlBuilder) {
        if self.classes.len() == 1 {
            list.push(child);
            return;
        }
        let new_index = self.class_index(child.class());
        let at = list
            .iter()
            .position(|existing| match self.class_index(existing.class()) {
                None => true,
                Some(idx) => new_index.is_some_and(|n| n < idx),
            })
            .unwrap_or(list.len());
        list.insert(at, child);
    }
}

/// Builder for [`XmlChildProperty`].
pub struct XmlChildPropertyBuilder {
    classes: Vec<ClassFn>,
    relative_xpath: String,
    is_single: bool,
}

impl XmlChildPropertyBuilder {
    /// Where children are rooted relative to the owner, `.` by default.
    pub fn relative_xpath(mut self, xpath: impl Into<String>) -> Self {
        self.relative_xpath = xpath.into();
        self
    }

    /// Exactly one child, always present.
    pub fn single(mut self) -> Self {
        self.is_single = true;
        self
    }

    /// Check the declaration and produce the descriptor.
    pub fn build(self) -> Result<XmlChildProperty, ConfigError> {
        if self.classes.is_empty() || self.relative_xpath.is_empty() {
            return Err(ConfigError::EmptyXpath);
        }
        if self.is_single && self.classes.len() > 1 {
            return Err(ConfigError::MultipleClassesOnSingleton {
                xpath: self.relative_xpath,
            });
        }
        let params = template_params(&self.relative_xpath);
        Ok(XmlChildProperty {
            classes: self.classes,
            relative_xpath: self.relative_xpath,
            params,
            is_single: self.is_single,
        })
    }
}

/// Names referenced as `%(name)s`, in order of appearance.
pub(crate) fn template_params(template: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("%(") {
        let after = &rest[start + 2..];
        let Some(end) = after.find(")s") else {
            break;
        };
        params.push(after[..end].to_string());
        rest = &after[end + 2..];
    }
    params
}

/// Substitute each `%(name)s` in `template` with `lookup(name)`.
pub(crate) fn interpolate<F>(template: &str, params: &[String], lookup: F) -> Result<String, Error>
where
    F: Fn(&str) -> Result<String, Error>,
{
    let mut out = template.to_string();
    for name in params {
        let value = lookup(name)?;
        out = out.replace(&format!("%({name})s"), &value);
    }
    Ok(out)
}
