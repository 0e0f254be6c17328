//! Arena-backed XML document.
//!
//! Uses `indextree` as the arena, so copying a document is a plain clone and
//! node handles stay valid while siblings are inserted or removed.

use indextree::{Arena, NodeId};
use xmlbuilder_path::{Condition, Path, Segment};

use crate::namespaces::Namespaces;
use crate::node::{Element, NodeRef, XmlNode};
use crate::{XmlError, XmlErrorKind};

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena<XmlNode>,
    document: NodeId,
}

impl Document {
    /// Create a document with no root element yet.
    pub fn empty() -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(XmlNode::Document);
        Self { arena, document }
    }

    /// Parse XML text into a document.
    pub fn parse(input: &str) -> Result<Self, XmlError> {
        crate::parser::parse_document(input)
    }

    /// The document node (parent of the root element).
    pub fn document_node(&self) -> NodeId {
        self.document
    }

    /// The root element, if the document has one.
    pub fn root_element(&self) -> Option<NodeId> {
        self.document
            .children(&self.arena)
            .find(|id| matches!(self.node(*id), Some(XmlNode::Element(_))))
    }

    /// The payload of a live node.
    pub fn node(&self, id: NodeId) -> Option<&XmlNode> {
        self.arena
            .get(id)
            .filter(|n| !n.is_removed())
            .map(|n| n.get())
    }

    /// The element payload of a live element node.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).and_then(XmlNode::as_element)
    }

    /// Mutable element payload.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.arena.get_mut(id) {
            Some(n) if !n.is_removed() => match n.get_mut() {
                XmlNode::Element(e) => Some(e),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent())
    }

    /// Children of a node, in document order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Last child of a node.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.last_child())
    }

    /// Sibling immediately before a node.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.previous_sibling())
    }

    /// Sibling immediately after a node.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.next_sibling())
    }

    /// True if the node is a markup-free text node.
    pub fn is_plain_text(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(XmlNode::is_plain_text)
    }

    /// True if an element has child nodes or attributes.
    pub fn has_content(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(Element::has_attributes) || self.last_child(id).is_some()
    }

    /// Create a detached element.
    pub fn new_element(&mut self, name: impl Into<String>) -> NodeId {
        self.arena.new_node(XmlNode::Element(Element::new(name)))
    }

    /// Create a detached text node.
    pub fn new_text(&mut self, content: impl Into<String>) -> NodeId {
        self.arena.new_node(XmlNode::Text(content.into()))
    }

    /// Create a detached node with an arbitrary payload.
    pub fn new_node(&mut self, node: XmlNode) -> NodeId {
        self.arena.new_node(node)
    }

    /// Link `child` as the last child of `parent`.
    ///
    /// A text node appended after a text node is merged into it; the id of
    /// the node that ends up holding the content is returned.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        if let Some(last) = self.last_child(parent)
            && self.merge_text(last, child)
        {
            return last;
        }
        parent.append(child, &mut self.arena);
        child
    }

    /// Link `node` right after `anchor`, merging adjacent text the same way
    /// [`append_child`](Self::append_child) does.
    pub fn insert_after(&mut self, anchor: NodeId, node: NodeId) -> NodeId {
        if self.merge_text(anchor, node) {
            return anchor;
        }
        anchor.insert_after(node, &mut self.arena);
        node
    }

    fn merge_text(&mut self, into: NodeId, from: NodeId) -> bool {
        let extra = match self.node(from) {
            Some(XmlNode::Text(t)) => t.clone(),
            _ => return false,
        };
        match self.arena.get_mut(into).map(|n| n.get_mut()) {
            Some(XmlNode::Text(existing)) => existing.push_str(&extra),
            _ => return false,
        }
        from.remove(&mut self.arena);
        true
    }

    /// Unlink a node from its parent. With `release` the subtree's storage is
    /// freed as well; otherwise it stays in the arena, detached.
    pub fn unlink(&mut self, id: NodeId, release: bool) {
        if release {
            id.remove_subtree(&mut self.arena);
        } else {
            id.detach(&mut self.arena);
        }
    }

    /// Number of nodes still holding storage, linked or not.
    pub fn live_nodes(&self) -> usize {
        self.arena.iter().filter(|n| !n.is_removed()).count()
    }

    /// Concatenated text of a node and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for desc in id.descendants(&self.arena) {
            match self.node(desc) {
                Some(XmlNode::Text(t)) | Some(XmlNode::CData(t)) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Replace every child of `id` with a single text node (or with nothing,
    /// for empty text). Text nodes get their content replaced.
    pub fn set_text_content(&mut self, id: NodeId, content: &str) {
        if let Some(node) = self.arena.get_mut(id)
            && let XmlNode::Text(t) | XmlNode::CData(t) = node.get_mut()
        {
            *t = content.to_string();
            return;
        }

        let children: Vec<_> = id.children(&self.arena).collect();
        for child in children {
            child.remove_subtree(&mut self.arena);
        }
        if !content.is_empty() {
            let text = self.new_text(content);
            id.append(text, &mut self.arena);
        }
    }

    /// Deep-copy a subtree of another document into this arena. The copy is
    /// returned detached.
    pub fn import(&mut self, other: &Document, node: NodeId) -> NodeId {
        let payload = match other.node(node) {
            Some(XmlNode::Document) | None => XmlNode::Text(String::new()),
            Some(payload) => payload.clone(),
        };
        let id = self.arena.new_node(payload);
        let children: Vec<_> = other.children(node).collect();
        for child in children {
            let copied = self.import(other, child);
            id.append(copied, &mut self.arena);
        }
        id
    }

    /// Resolve a namespace prefix from the declarations in scope at `id`.
    pub fn resolve_prefix(&self, id: NodeId, prefix: &str) -> Option<&str> {
        id.ancestors(&self.arena)
            .filter_map(|a| self.element(a))
            .find_map(|e| e.declared_namespace(prefix))
    }

    /// Evaluate `path` with `context` as the `.` node.
    ///
    /// A path that matches nothing yields an empty list; only an unknown
    /// namespace prefix is an error.
    pub fn select(
        &self,
        context: NodeId,
        path: &Path,
        namespaces: &Namespaces,
    ) -> Result<Vec<NodeRef>, XmlError> {
        let segments = path.segments();
        let (mut current, rest) = match segments.first() {
            Some(first) if first.is_document() => (vec![self.document], &segments[1..]),
            Some(first) if first.is_context() => (vec![context], &segments[1..]),
            _ => (vec![context], segments),
        };

        for (idx, segment) in rest.iter().enumerate() {
            if segment.is_attribute() {
                // attributes have no children, anything after them is empty
                if idx + 1 != rest.len() {
                    return Ok(Vec::new());
                }
                let name = segment.qualified_name();
                return Ok(current
                    .into_iter()
                    .filter(|id| {
                        self.element(*id)
                            .is_some_and(|e| e.attribute(&name).is_some())
                    })
                    .map(|element| NodeRef::Attribute {
                        element,
                        name: name.clone(),
                    })
                    .collect());
            }

            if segment.is_context() {
                continue;
            }

            let mut next = Vec::new();
            for parent in current {
                let mut matched = Vec::new();
                for child in self.children(parent) {
                    if self.element_matches(child, segment, namespaces)? {
                        matched.push(child);
                    }
                }
                match segment.condition() {
                    Some(Condition::Position(n)) => {
                        if let Some(hit) = n.checked_sub(1).and_then(|i| matched.get(i)) {
                            next.push(*hit);
                        }
                    }
                    _ => next.extend(matched),
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }

        Ok(current.into_iter().map(NodeRef::Node).collect())
    }

    fn element_matches(
        &self,
        id: NodeId,
        segment: &Segment,
        namespaces: &Namespaces,
    ) -> Result<bool, XmlError> {
        let Some(element) = self.element(id) else {
            return Ok(false);
        };

        let name_matches = match segment.namespace() {
            None => element.name() == segment.name(),
            Some(prefix) => {
                if element.local_name() != segment.name() {
                    return Ok(false);
                }
                let Some(wanted) = namespaces.uri(prefix) else {
                    return Err(XmlError::new(XmlErrorKind::UnknownNamespace(
                        prefix.to_string(),
                    )));
                };
                match element.prefix() {
                    None => false,
                    Some(own) => match self.resolve_prefix(id, own) {
                        Some(uri) => uri == wanted,
                        None => own == prefix,
                    },
                }
            }
        };

        if !name_matches {
            return Ok(false);
        }

        Ok(match segment.predicate() {
            Some((attribute, value)) => element.attribute(attribute) == Some(value),
            None => true,
        })
    }

    /// Serialize the subtree rooted at `id`.
    pub fn to_xml(&self, id: NodeId) -> String {
        crate::serializer::serialize_node(self, id)
    }
}
