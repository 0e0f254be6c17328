//! Path-addressed reads and edits on a single document.

use indextree::NodeId;
use xmlbuilder_path::Path;

use crate::document::Document;
use crate::namespaces::Namespaces;
use crate::node::NodeRef;
use crate::serializer::serialize_attribute;
use crate::tracing_macros::{debug, trace};
use crate::{XmlError, XmlErrorKind};

/// A document plus the query context bound to its root element.
///
/// Paths starting with `.` are evaluated against the root element, paths
/// starting with `/` against the document.
#[derive(Debug, Clone)]
pub struct XmlApi {
    doc: Document,
    namespaces: Namespaces,
    top_node: Option<NodeId>,
}

impl XmlApi {
    /// Parse XML text.
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        Ok(Self::from_document(Document::parse(xml)?))
    }

    /// Wrap an existing document.
    pub fn from_document(doc: Document) -> Self {
        Self {
            doc,
            namespaces: Namespaces::default(),
            top_node: None,
        }
    }

    /// An independent deep copy of the document with a fresh query context.
    pub fn copy_api(&self) -> Self {
        Self {
            doc: self.doc.clone(),
            namespaces: self.namespaces.clone(),
            top_node: None,
        }
    }

    /// The underlying document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The namespace prefixes paths may use.
    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// Make `prefix` usable in paths evaluated by this context.
    pub fn register_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.namespaces.register(prefix, uri);
    }

    /// The root element; `.` in paths.
    pub fn context_node(&self) -> Result<NodeId, XmlError> {
        self.doc
            .root_element()
            .ok_or_else(|| XmlError::new(XmlErrorKind::MissingRoot))
    }

    /// Mark a node that [`node_remove`](Self::node_remove) must never unlink.
    /// Returns the previous mark.
    pub fn set_top_node(&mut self, node: Option<NodeId>) -> Option<NodeId> {
        core::mem::replace(&mut self.top_node, node)
    }

    /// The node currently protected from removal, if any.
    pub fn top_node(&self) -> Option<NodeId> {
        self.top_node
    }

    /// First node matching `xpath`.
    pub fn find(&self, xpath: &str) -> Result<Option<NodeRef>, XmlError> {
        let path = Path::parse(xpath)?;
        self.find_path(&path)
    }

    /// Every node matching `xpath`, in document order.
    pub fn find_all(&self, xpath: &str) -> Result<Vec<NodeRef>, XmlError> {
        let path = Path::parse(xpath)?;
        self.doc
            .select(self.context_node()?, &path, &self.namespaces)
    }

    fn find_path(&self, path: &Path) -> Result<Option<NodeRef>, XmlError> {
        let found = self
            .doc
            .select(self.context_node()?, path, &self.namespaces)?;
        Ok(found.into_iter().next())
    }

    /// Text of an element or value of an attribute.
    pub fn content(&self, node: &NodeRef) -> Option<String> {
        match node {
            NodeRef::Node(id) => self.doc.node(*id).map(|_| self.doc.text_content(*id)),
            NodeRef::Attribute { element, name } => self
                .doc
                .element(*element)
                .and_then(|e| e.attribute(name))
                .map(str::to_string),
        }
    }

    /// Replace the text of an element or the value of an attribute.
    pub fn set_content(&mut self, node: &NodeRef, value: &str) -> Result<(), XmlError> {
        match node {
            NodeRef::Node(id) => {
                if self.doc.node(*id).is_none() {
                    return Err(XmlError::new(XmlErrorKind::StaleNode));
                }
                self.doc.set_text_content(*id, value);
            }
            NodeRef::Attribute { element, name } => {
                let element = self
                    .doc
                    .element_mut(*element)
                    .ok_or_else(|| XmlError::new(XmlErrorKind::StaleNode))?;
                element.set_attribute(name.clone(), value);
            }
        }
        Ok(())
    }

    /// Serialized text of the first node matching `xpath`, or an empty
    /// string if nothing matches. Non-empty results end with a newline.
    pub fn get_xml(&self, xpath: &str) -> Result<String, XmlError> {
        let Some(found) = self.find(xpath)? else {
            return Ok(String::new());
        };
        let xml = match &found {
            NodeRef::Node(id) => self.doc.to_xml(*id),
            NodeRef::Attribute { element, name } => {
                let value = self
                    .doc
                    .element(*element)
                    .and_then(|e| e.attribute(name))
                    .unwrap_or_default();
                serialize_attribute(name, value)
            }
        };
        Ok(sanitize_serialized(xml))
    }

    /// Create every missing node along `xpath` and return the final one.
    ///
    /// On `<foo/>`, `./bar[@kind='x']/baz/@id` yields
    ///
    /// ```text
    /// <foo>
    ///   <bar kind="x">
    ///     <baz id=""/>
    ///   </bar>
    /// </foo>
    /// ```
    pub fn node_make_stub(&mut self, xpath: &str) -> Result<NodeRef, XmlError> {
        let path = Path::parse(xpath)?;
        let segments = path.segments();

        let (mut parent_path, mut parent, rest) = if path.is_absolute() {
            let first = segments
                .get(1)
                .ok_or_else(|| XmlError::new(XmlErrorKind::MissingRoot))?;
            let root_path = format!("/{}", first.raw());
            match self.find(&root_path)? {
                Some(NodeRef::Node(id)) => (root_path, id, &segments[2..]),
                _ => return Err(XmlError::new(XmlErrorKind::MissingRoot)),
            }
        } else if segments[0].is_context() {
            (".".to_string(), self.context_node()?, &segments[1..])
        } else {
            (".".to_string(), self.context_node()?, segments)
        };

        for segment in rest {
            if segment.is_attribute() {
                let name = segment.qualified_name();
                let element = self
                    .doc
                    .element_mut(parent)
                    .ok_or_else(|| XmlError::new(XmlErrorKind::StaleNode))?;
                if element.attribute(&name).is_none() {
                    element.set_attribute(name.clone(), "");
                }
                return Ok(NodeRef::Attribute {
                    element: parent,
                    name,
                });
            }

            parent_path.push('/');
            parent_path.push_str(segment.raw());
            if let Some(NodeRef::Node(id)) = self.find(&parent_path)? {
                parent = id;
                continue;
            }
            if segment.is_context() {
                continue;
            }

            if let Some(prefix) = segment.namespace() {
                self.declare_namespace(prefix)?;
            }
            let created = self.doc.new_element(segment.qualified_name());
            parent = self.node_add_child(parent, created);
            trace!(segment = %segment, path = %parent_path, "created stub node");

            if let Some((attribute, value)) = segment.predicate()
                && let Some(element) = self.doc.element_mut(parent)
            {
                element.set_attribute(attribute, value);
            }
        }

        Ok(NodeRef::Node(parent))
    }

    /// Declare `prefix` on the root element unless it already is.
    fn declare_namespace(&mut self, prefix: &str) -> Result<(), XmlError> {
        let root = self.context_node()?;
        if self.doc.resolve_prefix(root, prefix).is_some() {
            return Ok(());
        }
        let uri = self
            .namespaces
            .uri(prefix)
            .ok_or_else(|| XmlError::new(XmlErrorKind::UnknownNamespace(prefix.to_string())))?
            .to_string();
        if let Some(element) = self.doc.element_mut(root) {
            element.set_attribute(format!("xmlns:{prefix}"), uri);
        }
        Ok(())
    }

    /// Remove the node at `xpath`, then walk up removing ancestors that were
    /// left empty. Ancestors that still hold children or attributes are kept,
    /// and the walk stops at the root element or the top node.
    ///
    /// With `release == false` the removed subtree is only detached.
    pub fn node_remove(&mut self, xpath: &str, release: bool) -> Result<(), XmlError> {
        let original = Path::parse(xpath)?;
        let root = self.context_node()?;
        let mut next = Some(original.clone());

        while let Some(current) = next {
            let is_original = current == original;
            next = current.parent();

            let Some(found) = self.find_path(&current)? else {
                continue;
            };

            match found {
                NodeRef::Attribute { element, name } => {
                    debug!(path = %current, "removing attribute");
                    if let Some(element) = self.doc.element_mut(element) {
                        element.remove_attribute(&name);
                    }
                }
                NodeRef::Node(id) => {
                    if self.doc.element(id).is_none() {
                        continue;
                    }
                    if self.doc.has_content(id) && !is_original {
                        continue;
                    }
                    if id == root || Some(id) == self.top_node {
                        break;
                    }

                    if let Some(white) = self.doc.previous_sibling(id)
                        && self.doc.is_plain_text(white)
                    {
                        self.doc.unlink(white, true);
                    }
                    debug!(path = %current, release, "removing node");
                    self.doc.unlink(id, release);
                }
            }
        }
        Ok(())
    }

    /// Append `node` as the last element child of `parent`, adding
    /// indentation text around it so the result stays pretty-printed.
    pub fn node_add_child(&mut self, parent: NodeId, node: NodeId) -> NodeId {
        let last_is_text = self
            .doc
            .last_child(parent)
            .is_some_and(|last| self.doc.is_plain_text(last));

        if !last_is_text {
            // first child: reuse the indentation in front of the parent
            let indent = match self.doc.previous_sibling(parent) {
                Some(prev) if self.doc.is_plain_text(prev) => self.doc.text_content(prev),
                _ => "\n".to_string(),
            };
            let text = self.doc.new_text(indent);
            self.doc.append_child(parent, text);
        }

        let Some(last) = self.doc.last_child(parent) else {
            return self.doc.append_child(parent, node);
        };
        let trailing = self.doc.text_content(last);

        let spacer = self.doc.new_text("  ");
        let anchor = self.doc.insert_after(last, spacer);
        let node = self.doc.insert_after(anchor, node);
        let trailing = self.doc.new_text(trailing);
        self.doc.insert_after(node, trailing);
        node
    }

    /// Parse a fragment and copy its root element into this document. The
    /// copy is returned detached, ready for [`node_add_child`](Self::node_add_child).
    pub fn import_xml(&mut self, xml: &str) -> Result<NodeId, XmlError> {
        let fragment = Document::parse(xml)?;
        let root = fragment
            .root_element()
            .ok_or_else(|| XmlError::new(XmlErrorKind::NoRootElement))?;
        Ok(self.doc.import(&fragment, root))
    }
}

/// Strip a leading `<?...?>` line and make sure non-empty output ends with a
/// newline.
fn sanitize_serialized(mut xml: String) -> String {
    if xml.starts_with("<?") {
        xml = match xml.split_once('\n') {
            Some((_, rest)) => rest.to_string(),
            None => String::new(),
        };
    }
    if !xml.is_empty() && !xml.ends_with('\n') {
        xml.push('\n');
    }
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_declaration_line() {
        assert_eq!(
            sanitize_serialized("<?xml version=\"1.0\"?>\n<a/>".to_string()),
            "<a/>\n"
        );
        assert_eq!(sanitize_serialized(String::new()), "");
    }

    #[test]
    fn top_node_is_never_removed() {
        let mut api = XmlApi::parse("<a><b/></a>").unwrap();
        let b = api.find_path(&Path::parse("./b").unwrap()).unwrap().unwrap();
        api.set_top_node(Some(b.node_id()));
        api.node_remove("./b", true).unwrap();
        assert_eq!(api.get_xml(".").unwrap(), "<a><b/></a>\n");
    }
}
