//! Where an object lives: its document handle and its addressing paths.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use xmlbuilder_tree::{Namespaces, XmlApi};

/// A document shared by every object of one connected tree.
///
/// Cloning the handle shares the document; use [`XmlApi::copy_api`] for an
/// independent copy.
#[derive(Debug, Clone)]
pub struct SharedXmlApi(Rc<RefCell<XmlApi>>);

impl SharedXmlApi {
    /// Wrap a document in a new shared handle.
    pub fn new(api: XmlApi) -> Self {
        Self(Rc::new(RefCell::new(api)))
    }

    /// Borrow the document for reading.
    pub fn borrow(&self) -> Ref<'_, XmlApi> {
        self.0.borrow()
    }

    /// Borrow the document for editing.
    pub fn borrow_mut(&self) -> RefMut<'_, XmlApi> {
        self.0.borrow_mut()
    }

    /// True if both handles point at the same document.
    pub fn ptr_eq(&self, other: &SharedXmlApi) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Path state of one object.
///
/// The object's own location is `parent_xpath` joined with
/// `relative_object_xpath`; both are empty for a standalone object.
#[derive(Debug, Clone)]
pub struct XmlState {
    root_name: String,
    stub_path: String,
    relative_object_xpath: String,
    parent_xpath: String,
    pub(crate) is_build: bool,
    pub(crate) api: SharedXmlApi,
}

impl XmlState {
    pub(crate) fn new(
        root_name: &str,
        api: SharedXmlApi,
        is_build: bool,
        parent_xpath: String,
        relative_object_xpath: String,
    ) -> Self {
        Self {
            root_name: root_name.to_string(),
            stub_path: format!("/{root_name}"),
            relative_object_xpath,
            parent_xpath,
            is_build,
            api,
        }
    }

    /// The shared document.
    pub fn api(&self) -> &SharedXmlApi {
        &self.api
    }

    /// True if the object was built from scratch rather than parsed.
    pub fn is_build(&self) -> bool {
        self.is_build
    }

    pub(crate) fn set_relative_object_xpath(&mut self, xpath: &str) {
        self.relative_object_xpath = xpath.to_string();
    }

    pub(crate) fn set_parent_xpath(&mut self, xpath: &str) {
        self.parent_xpath = xpath.to_string();
    }

    /// Absolute location of the object in the shared document, or an empty
    /// string for a standalone root object.
    pub fn get_root_xpath(&self) -> String {
        let relative = &self.relative_object_xpath;
        if self.parent_xpath.is_empty() {
            return relative.clone();
        }
        let relative = relative.strip_prefix('.').unwrap_or(relative);
        format!("{}{relative}", self.parent_xpath)
    }

    /// Rewrite a property path declared relative to the class root so it
    /// addresses this object inside the shared document.
    pub fn fix_relative_xpath(&self, xpath: &str) -> String {
        let fullpath = self.get_root_xpath();
        if fullpath.is_empty() || fullpath == self.stub_path {
            return xpath.to_string();
        }
        if xpath.starts_with('.') {
            return format!("{fullpath}{}", xpath.trim_matches('.'));
        }
        if xpath.matches('/').count() == 1 {
            return fullpath;
        }
        match xpath.splitn(3, '/').nth(2) {
            Some(rest) => format!("{fullpath}/{rest}"),
            None => fullpath,
        }
    }

    /// The empty document for this object's root element, declaring the
    /// namespace of a prefixed root name.
    pub fn make_xml_stub(&self, namespaces: &Namespaces) -> String {
        make_xml_stub(&self.root_name, namespaces)
    }
}

pub(crate) fn make_xml_stub(root_name: &str, namespaces: &Namespaces) -> String {
    let mut stub = format!("<{root_name}");
    if let Some((prefix, _)) = root_name.split_once(':')
        && let Some(uri) = namespaces.uri(prefix)
    {
        stub.push_str(&format!(" xmlns:{prefix}='{uri}'"));
    }
    stub.push_str("/>");
    stub
}

/// Indent every line of `xml` by `level` spaces.
pub fn xml_indent(xml: &str, level: usize) -> String {
    if xml.is_empty() {
        return String::new();
    }
    if level == 0 {
        return xml.to_string();
    }
    let pad = " ".repeat(level);
    xml.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop everything but printable ASCII.
pub(crate) fn sanitize_xml(xml: &str) -> String {
    xml.chars()
        .filter(|c| c.is_ascii_graphic() || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c'))
        .collect()
}
