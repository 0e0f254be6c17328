//! Serialize document subtrees back to XML text.
//!
//! Whitespace text nodes are written as-is, so a document that was parsed and
//! not edited serializes to its original formatting.

use core::fmt::{self, Write};

use indextree::NodeId;

use crate::document::Document;
use crate::escaping::EscapingWriter;
use crate::node::XmlNode;

/// Serialize the subtree rooted at `id`. The document node serializes as its
/// children concatenated.
pub(crate) fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    // writing into a String cannot fail
    let _ = write_node(doc, id, &mut out);
    out
}

/// Serialize one attribute the way it appears inside a start tag.
pub(crate) fn serialize_attribute(name: &str, value: &str) -> String {
    let mut out = String::new();
    let _ = write_attribute(name, value, &mut out);
    out
}

fn write_attribute(name: &str, value: &str, out: &mut dyn Write) -> fmt::Result {
    write!(out, " {name}=\"")?;
    EscapingWriter::attribute(out).write_str(value)?;
    out.write_char('"')
}

fn write_node(doc: &Document, id: NodeId, out: &mut dyn Write) -> fmt::Result {
    let Some(node) = doc.node(id) else {
        return Ok(());
    };

    match node {
        XmlNode::Document => {
            let children: Vec<_> = doc.children(id).collect();
            for (idx, child) in children.iter().enumerate() {
                write_node(doc, *child, out)?;
                // top-level nodes are not separated by text in the tree
                if idx + 1 < children.len() {
                    out.write_char('\n')?;
                }
            }
            Ok(())
        }
        XmlNode::Element(element) => {
            write!(out, "<{}", element.name())?;
            for (name, value) in element.attributes() {
                write_attribute(name, value, out)?;
            }
            if doc.last_child(id).is_none() {
                return out.write_str("/>");
            }
            out.write_char('>')?;
            for child in doc.children(id) {
                write_node(doc, child, out)?;
            }
            write!(out, "</{}>", element.name())
        }
        XmlNode::Text(text) => EscapingWriter::text(out).write_str(text),
        XmlNode::CData(text) => write!(out, "<![CDATA[{text}]]>"),
        XmlNode::Comment(text) => write!(out, "<!--{text}-->"),
        XmlNode::ProcessingInstruction(text) => write!(out, "<?{text}?>"),
        XmlNode::DocType(text) => write!(out, "<!DOCTYPE {text}>"),
    }
}
