//! Build a [`Document`] from XML text using quick-xml.
//!
//! Text is never trimmed: indentation between elements becomes text nodes so
//! that serializing an unedited document reproduces its input.

use quick_xml::Reader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::Event;

use crate::document::Document;
use crate::node::XmlNode;
use crate::tracing_macros::trace;
use crate::{XmlError, XmlErrorKind};

pub(crate) fn parse_document(input: &str) -> Result<Document, XmlError> {
    trace!(input_len = input.len(), "parsing XML document");

    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut doc = Document::empty();
    let mut stack = vec![doc.document_node()];
    let mut seen_root = false;

    let fail = |kind: XmlErrorKind, at: usize| {
        XmlError::new(kind)
            .with_source(input)
            .with_span((at, 0))
    };

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let at = reader.error_position() as usize;
                return Err(fail(XmlErrorKind::Parse(e.to_string()), at));
            }
        };
        let at = reader.buffer_position() as usize;
        let top_level = stack.len() == 1;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = core::str::from_utf8(e.name().as_ref())
                    .map_err(|err| fail(XmlErrorKind::Parse(err.to_string()), at))?
                    .to_string();

                if top_level {
                    if seen_root {
                        return Err(fail(XmlErrorKind::MultipleRoots(name), at));
                    }
                    seen_root = true;
                }

                let id = doc.new_element(name);
                for attr in e.attributes() {
                    let attr = attr.map_err(|err| fail(XmlErrorKind::Parse(err.to_string()), at))?;
                    let key = core::str::from_utf8(attr.key.as_ref())
                        .map_err(|err| fail(XmlErrorKind::Parse(err.to_string()), at))?
                        .to_string();
                    let value = attr
                        .unescape_value()
                        .map_err(|err| fail(XmlErrorKind::Parse(err.to_string()), at))?;
                    if let Some(element) = doc.element_mut(id) {
                        element.set_attribute(key, value.into_owned());
                    }
                }

                let parent = stack[stack.len() - 1];
                doc.append_child(parent, id);
                if matches!(event, Event::Start(_)) {
                    stack.push(id);
                }
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags
                stack.pop();
            }
            Event::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|err| fail(XmlErrorKind::Parse(err.to_string()), at))?;
                if top_level {
                    if !text.trim().is_empty() {
                        return Err(fail(XmlErrorKind::ContentOutsideRoot, at));
                    }
                    continue;
                }
                push_text(&mut doc, &stack, text.into_owned());
            }
            Event::GeneralRef(e) => {
                let raw = e
                    .decode()
                    .map_err(|err| fail(XmlErrorKind::Parse(err.to_string()), at))?;
                if top_level {
                    return Err(fail(XmlErrorKind::ContentOutsideRoot, at));
                }
                let resolved = resolve_entity(&raw).map_err(|kind| fail(kind, at))?;
                push_text(&mut doc, &stack, resolved);
            }
            Event::CData(e) => {
                let text = utf8(e.as_ref()).map_err(|kind| fail(kind, at))?;
                push_node(&mut doc, &stack, XmlNode::CData(text));
            }
            Event::Comment(e) => {
                let text = utf8(e.as_ref()).map_err(|kind| fail(kind, at))?;
                push_node(&mut doc, &stack, XmlNode::Comment(text));
            }
            Event::PI(e) => {
                let text = utf8(e.as_ref()).map_err(|kind| fail(kind, at))?;
                push_node(&mut doc, &stack, XmlNode::ProcessingInstruction(text));
            }
            Event::DocType(e) => {
                let text = utf8(e.as_ref()).map_err(|kind| fail(kind, at))?;
                push_node(&mut doc, &stack, XmlNode::DocType(text.trim().to_string()));
            }
            Event::Decl(_) => {
                // the XML declaration is not kept; serialization never emits one
            }
            Event::Eof => break,
        }
    }

    if stack.len() > 1 {
        return Err(fail(XmlErrorKind::UnexpectedEof, input.len()));
    }
    if !seen_root {
        return Err(fail(XmlErrorKind::NoRootElement, 0));
    }
    Ok(doc)
}

fn push_text(doc: &mut Document, stack: &[indextree::NodeId], text: String) {
    if text.is_empty() {
        return;
    }
    let parent = stack[stack.len() - 1];
    let id = doc.new_text(text);
    doc.append_child(parent, id);
}

fn push_node(doc: &mut Document, stack: &[indextree::NodeId], node: XmlNode) {
    let parent = stack[stack.len() - 1];
    let id = doc.new_node(node);
    doc.append_child(parent, id);
}

fn utf8(bytes: &[u8]) -> Result<String, XmlErrorKind> {
    core::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| XmlErrorKind::Parse(e.to_string()))
}

/// Resolve a general entity reference.
fn resolve_entity(raw: &str) -> Result<String, XmlErrorKind> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.into());
    }

    if let Some(rest) = raw.strip_prefix('#') {
        let code = if let Some(hex) = rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            u32::from_str_radix(hex, 16)
                .map_err(|_| XmlErrorKind::Parse(format!("invalid hex entity: #{rest}")))?
        } else {
            rest.parse::<u32>()
                .map_err(|_| XmlErrorKind::Parse(format!("invalid decimal entity: #{rest}")))?
        };

        let ch = char::from_u32(code)
            .ok_or_else(|| XmlErrorKind::Parse(format!("invalid unicode scalar: {code}")))?;
        return Ok(ch.to_string());
    }

    Err(XmlErrorKind::Parse(format!("undefined entity: &{raw};")))
}
