//! Node payloads stored in the document arena.

use indexmap::IndexMap;
use indextree::NodeId;

/// What a single arena slot holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// The document itself; parent of the root element.
    Document,
    /// An element with its attributes. Children live in the arena.
    Element(Element),
    /// Character data, stored unescaped.
    Text(String),
    /// A `<![CDATA[...]]>` section.
    CData(String),
    /// A `<!--...-->` comment.
    Comment(String),
    /// A `<?...?>` processing instruction.
    ProcessingInstruction(String),
    /// A `<!DOCTYPE ...>` declaration.
    DocType(String),
}

impl XmlNode {
    /// Returns `Some(&Element)` if this is an element.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `Some(&str)` if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlNode::Text(t) => Some(t),
            _ => None,
        }
    }

    /// True for a text node that holds no markup, the kind used purely for
    /// indentation between elements.
    pub fn is_plain_text(&self) -> bool {
        matches!(self, XmlNode::Text(t) if !t.contains('<'))
    }
}

/// An element: qualified tag name plus attributes in document order.
///
/// Namespace declarations (`xmlns:foo="..."`) are ordinary attributes here,
/// which keeps them in their original position when serializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: IndexMap<String, String>,
}

impl Element {
    /// Create an element with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Qualified name, e.g. `qemu:arg`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace prefix of the tag, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// The tag name without its prefix.
    pub fn local_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Get an attribute value by qualified name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Remove an attribute, preserving the order of the others.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    /// True if the element carries any attribute.
    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Iterate attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The URI this element declares for `prefix`, if it declares one.
    pub fn declared_namespace(&self, prefix: &str) -> Option<&str> {
        self.attribute(&format!("xmlns:{prefix}"))
    }
}

/// A handle to something a path can select.
///
/// Attributes are not arena nodes, so they are addressed through their
/// owning element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// An arena node (element, text, ...).
    Node(NodeId),
    /// An attribute of an element.
    Attribute {
        /// The element carrying the attribute.
        element: NodeId,
        /// Qualified attribute name.
        name: String,
    },
}

impl NodeRef {
    /// The arena node behind this reference: the node itself, or the owning
    /// element for an attribute.
    pub fn node_id(&self) -> NodeId {
        match self {
            NodeRef::Node(id) => *id,
            NodeRef::Attribute { element, .. } => *element,
        }
    }

    /// True for attribute references.
    pub fn is_attribute(&self) -> bool {
        matches!(self, NodeRef::Attribute { .. })
    }
}
