//! Objects bound to a document, and their lifecycle.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use xmlbuilder_path::Path;
use xmlbuilder_tree::{NodeId, XmlApi};

use crate::class::{ClassRef, XmlClass, same_class};
use crate::property::{ValueKind, XmlProperty};
use crate::state::{SharedXmlApi, XmlState, make_xml_stub, sanitize_xml, xml_indent};
use crate::tracing_macros::{debug, trace};
use crate::tracker::PropertyTracker;
use crate::value::Value;
use crate::{ConfigError, Error};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one object. Copies get a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl core::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
enum ChildSlot {
    Single(Box<XmlBuilder>),
    List(Vec<XmlBuilder>),
}

impl ChildSlot {
    fn as_slice(&self) -> &[XmlBuilder] {
        match self {
            ChildSlot::Single(child) => core::slice::from_ref(&**child),
            ChildSlot::List(list) => list,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [XmlBuilder] {
        match self {
            ChildSlot::Single(child) => core::slice::from_mut(&mut **child),
            ChildSlot::List(list) => list,
        }
    }

    fn copy(&self) -> Self {
        match self {
            ChildSlot::Single(child) => ChildSlot::Single(Box::new(child.copy())),
            ChildSlot::List(list) => ChildSlot::List(list.iter().map(XmlBuilder::copy).collect()),
        }
    }
}

/// An object of some [`XmlClass`], bound to a location in a document.
///
/// A root object owns its document; children share their root's document
/// through the [`SharedXmlApi`] handle in their [`XmlState`].
#[derive(Debug)]
pub struct XmlBuilder {
    class: ClassRef,
    id: ObjectId,
    propstore: HashMap<String, Option<Value>>,
    proporder: Vec<String>,
    children: IndexMap<String, ChildSlot>,
    state: XmlState,
    tracker: Option<Rc<PropertyTracker>>,
}

impl XmlBuilder {
    /// A fresh object with no backing text (build mode).
    pub fn new(class: ClassRef) -> Result<Self, Error> {
        Self::construct(class, None, None)
    }

    /// An object hydrated from `xml`.
    pub fn parse(class: ClassRef, xml: &str) -> Result<Self, Error> {
        Self::construct(class, Some(xml), None)
    }

    /// Like [`new`](Self::new) or [`parse`](Self::parse), recording property
    /// usage of the whole object graph in `tracker`.
    pub fn new_tracked(
        class: ClassRef,
        xml: Option<&str>,
        tracker: Rc<PropertyTracker>,
    ) -> Result<Self, Error> {
        Self::construct(class, xml, Some(tracker))
    }

    fn construct(
        class: ClassRef,
        xml: Option<&str>,
        tracker: Option<Rc<PropertyTracker>>,
    ) -> Result<Self, Error> {
        let xml = xml.filter(|x| !x.is_empty());
        let is_build = xml.is_none();
        let text = xml.map(|x| {
            if class.sanitize() {
                sanitize_xml(x)
            } else {
                x.to_string()
            }
        });
        let api = root_api(class, text.as_deref())?;
        let state = XmlState::new(
            class.root_name(),
            SharedXmlApi::new(api),
            is_build,
            String::new(),
            String::new(),
        );
        Self::with_state(class, state, tracker)
    }

    fn child_of(
        class: ClassRef,
        parent: &XmlState,
        relative_xpath: String,
        tracker: Option<Rc<PropertyTracker>>,
    ) -> Result<Self, Error> {
        register_namespaces(class, &parent.api);
        let state = XmlState::new(
            class.root_name(),
            parent.api.clone(),
            parent.is_build,
            parent.get_root_xpath(),
            relative_xpath,
        );
        Self::with_state(class, state, tracker)
    }

    fn with_state(
        class: ClassRef,
        state: XmlState,
        tracker: Option<Rc<PropertyTracker>>,
    ) -> Result<Self, Error> {
        if let Some(tracker) = &tracker {
            tracker.declare(class);
        }
        let mut obj = XmlBuilder {
            class,
            id: ObjectId::next(),
            propstore: HashMap::new(),
            proporder: Vec::new(),
            children: IndexMap::new(),
            state,
            tracker,
        };
        debug!(
            root = class.root_name(),
            build = obj.state.is_build,
            path = %obj.state.get_root_xpath(),
            "constructed object"
        );
        obj.initial_child_parse()?;
        Ok(obj)
    }

    fn initial_child_parse(&mut self) -> Result<(), Error> {
        let class = self.class;
        let mut slots = IndexMap::new();

        for (name, prop) in class.children() {
            if prop.is_single() {
                let child_class = prop.primary_class();
                let path = prop.resolve_xpath(self, child_class)?;
                let child = Self::child_of(child_class, &self.state, path, self.tracker.clone())?;
                slots.insert(name.clone(), ChildSlot::Single(Box::new(child)));
                continue;
            }

            let mut list = Vec::new();
            if !self.state.is_build {
                for child_class in prop.classes() {
                    let path = prop.resolve_xpath(self, child_class)?;
                    let count = self
                        .state
                        .api
                        .borrow()
                        .find_all(&self.fix_relative_xpath(&path))?
                        .len();
                    for idx in 1..=count {
                        let child = Self::child_of(
                            child_class,
                            &self.state,
                            format!("{path}[{idx}]"),
                            self.tracker.clone(),
                        )?;
                        prop.append(&mut list, child);
                    }
                }
            }
            slots.insert(name.clone(), ChildSlot::List(list));
        }

        self.children = slots;
        self.set_child_xpaths()
    }

    // ========================================================================
    // Identity and addressing
    // ========================================================================

    /// This object's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// This object's class.
    pub fn class(&self) -> ClassRef {
        self.class
    }

    /// Path state: document handle and location.
    pub fn state(&self) -> &XmlState {
        &self.state
    }

    /// True if the object has no backing text.
    pub fn is_build(&self) -> bool {
        self.state.is_build
    }

    /// Location of this object in its document; empty for a root object.
    pub fn get_root_xpath(&self) -> String {
        self.state.get_root_xpath()
    }

    /// Rebase a class-relative path onto this object's location.
    pub fn fix_relative_xpath(&self, xpath: &str) -> String {
        self.state.fix_relative_xpath(xpath)
    }

    /// An independent copy: scalars copied by value, children copied deeply,
    /// the document shared.
    pub fn copy(&self) -> Self {
        XmlBuilder {
            class: self.class,
            id: ObjectId::next(),
            propstore: self.propstore.clone(),
            proporder: self.proporder.clone(),
            children: self
                .children
                .iter()
                .map(|(name, slot)| (name.clone(), slot.copy()))
                .collect(),
            state: self.state.clone(),
            tracker: self.tracker.clone(),
        }
    }

    fn set_parent_xpath(&mut self, xpath: &str) {
        self.state.set_parent_xpath(xpath);
        self.rebase_children();
    }

    fn set_relative_object_xpath(&mut self, xpath: &str) {
        self.state.set_relative_object_xpath(xpath);
        self.rebase_children();
    }

    fn rebase_children(&mut self) {
        let root = self.get_root_xpath();
        for slot in self.children.values_mut() {
            for child in slot.as_mut_slice() {
                child.set_parent_xpath(&root);
            }
        }
    }

    /// Point every child at its own element: `path` for singletons,
    /// `path[n]` for collection members, counting per class.
    fn set_child_xpaths(&mut self) -> Result<(), Error> {
        let class = self.class;
        let root = self.get_root_xpath();
        let mut typecount: HashMap<*const XmlClass, usize> = HashMap::new();
        let mut plan = Vec::new();

        for (name, prop) in class.children() {
            let Some(slot) = self.children.get(name) else {
                continue;
            };
            let mut paths = Vec::new();
            for child in slot.as_slice() {
                let suffix = if prop.is_single() {
                    String::new()
                } else {
                    let count = typecount.entry(child.class as *const XmlClass).or_insert(0);
                    *count += 1;
                    format!("[{count}]")
                };
                paths.push(format!("{}{suffix}", prop.resolve_xpath(self, child.class)?));
            }
            plan.push((name.clone(), paths));
        }

        for (name, paths) in plan {
            if let Some(slot) = self.children.get_mut(&name) {
                for (child, path) in slot.as_mut_slice().iter_mut().zip(paths) {
                    child.set_parent_xpath(&root);
                    child.set_relative_object_xpath(&path);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Scalar fields
    // ========================================================================

    fn property(&self, name: &str) -> Result<&'static XmlProperty, ConfigError> {
        let class: &'static XmlClass = self.class;
        class.property(name).ok_or_else(|| class.unknown_field(name))
    }

    /// Current value of a scalar field.
    ///
    /// Parsed objects read the document until the field is set; build-mode
    /// objects return the stored value or the default.
    pub fn get(&self, name: &str) -> Result<Option<Value>, Error> {
        let prop = self.property(name)?;
        if let Some(tracker) = &self.tracker {
            tracker.record_read(self.class, name);
        }

        let raw = if !self.propstore.contains_key(name) && !self.state.is_build {
            self.read_xml(prop)?
        } else {
            self.stored_value(name, prop)
        };
        prop.convert_get(name, raw)
    }

    /// [`get`](Self::get) rendered as text.
    pub fn get_str(&self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.get(name)?.map(|v| v.to_string()))
    }

    /// [`get`](Self::get) of an integer field.
    pub fn get_int(&self, name: &str) -> Result<Option<i64>, Error> {
        Ok(self.get(name)?.and_then(|v| v.as_int()))
    }

    /// [`get`](Self::get) of a boolean field; unset is `false`.
    pub fn get_bool(&self, name: &str) -> Result<bool, Error> {
        Ok(self.get(name)?.is_some_and(|v| v.is_truthy()))
    }

    fn read_xml(&self, prop: &XmlProperty) -> Result<Option<Value>, Error> {
        let xpath = self.fix_relative_xpath(prop.xpath());
        let api = self.state.api.borrow();
        let Some(node) = api.find(&xpath)? else {
            return Ok(None);
        };
        if prop.kind() == ValueKind::Bool {
            return Ok(Some(Value::Bool(true)));
        }
        Ok(api.content(&node).map(Value::Str))
    }

    fn can_default(&self, name: &str, prop: &XmlProperty) -> bool {
        self.state.is_build && !self.propstore.contains_key(name) && prop.has_default()
    }

    fn stored_value(&self, name: &str, prop: &XmlProperty) -> Option<Value> {
        if self.can_default(name, prop) {
            return prop.default_value(self);
        }
        self.propstore.get(name).cloned().flatten()
    }

    /// Set a scalar field. The document is only updated at serialization.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        self.set_value(name, Some(value.into()), true)
    }

    /// Set a scalar field to an explicit value or to explicitly nothing.
    pub fn set_option(&mut self, name: &str, value: Option<Value>) -> Result<(), Error> {
        self.set_value(name, value, true)
    }

    fn set_value(&mut self, name: &str, value: Option<Value>, validate: bool) -> Result<(), Error> {
        let prop = self.property(name)?;
        if let Some(tracker) = &self.tracker {
            tracker.record_write(self.class, name);
        }
        if validate {
            prop.validate(self, name, value.as_ref())?;
        }
        let value = prop.convert_set(self, name, value)?;

        self.propstore.insert(name.to_string(), value);
        self.proporder.retain(|k| k != name);
        self.proporder.push(name.to_string());
        Ok(())
    }

    fn apply_default(&mut self, name: &str, prop: &XmlProperty) -> Result<(), Error> {
        if !self.can_default(name, prop) {
            return Ok(());
        }
        let value = prop.default_value(self);
        trace!(field = name, "applying default");
        self.set_value(name, value, false)
    }

    fn flush_property(&self, name: &str, prop: &XmlProperty) -> Result<(), Error> {
        let value = self.propstore.get(name).cloned().flatten();
        let xpath = self.fix_relative_xpath(prop.xpath());
        let mut api = self.state.api.borrow_mut();

        match value {
            None | Some(Value::Bool(false)) => api.node_remove(&xpath, true)?,
            Some(value) => {
                let node = match api.find(&xpath)? {
                    Some(node) => node,
                    None => api.node_make_stub(&xpath)?,
                };
                // presence alone encodes true
                if value != Value::Bool(true) {
                    api.set_content(&node, &value.to_string())?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Render the object as XML.
    ///
    /// Build-mode objects render into a throwaway copy of the document, so
    /// repeated calls give the same text and leave the object untouched.
    /// An object that produced nothing beyond its empty root element yields
    /// an empty string.
    pub fn get_xml_config(&mut self) -> Result<String, Error> {
        let hooks = self.class.hooks().cloned();
        let staged = match &hooks {
            Some(hooks) => hooks.prepare_serialize(self)?,
            None => None,
        };
        let result = self.do_get_xml_config();
        if let Some(hooks) = &hooks {
            hooks.finish_serialize(self, staged);
        }
        result
    }

    fn do_get_xml_config(&mut self) -> Result<String, Error> {
        let stub = {
            let text = self.state.make_xml_stub(self.class.namespaces());
            XmlApi::parse(&text).map_err(Error::Parse)?.get_xml(".")?
        };

        let api = if self.state.is_build {
            SharedXmlApi::new(self.state.api.borrow().copy_api())
        } else {
            self.state.api.clone()
        };

        self.add_parse_bits(&api)?;
        let mut xml = api.borrow().get_xml(&self.fix_relative_xpath("."))?;

        if xml == stub {
            xml.clear();
        }
        if !xml.is_empty() && self.get_root_xpath().is_empty() && !xml.ends_with('\n') {
            xml.push('\n');
        }
        Ok(xml)
    }

    /// Write every field into `api`, restoring the explicit-value store
    /// afterwards so defaults applied here do not stick.
    fn add_parse_bits(&mut self, api: &SharedXmlApi) -> Result<(), Error> {
        let saved_store = self.propstore.clone();
        let saved_order = self.proporder.clone();
        let saved_api = core::mem::replace(&mut self.state.api, api.clone());

        let result = self.do_add_parse_bits();

        self.state.api = saved_api;
        self.propstore = saved_store;
        self.proporder = saved_order;
        result
    }

    fn do_add_parse_bits(&mut self) -> Result<(), Error> {
        let previous_top = if ends_with_index(&self.get_root_xpath()) {
            Some(self.pin_own_node()?)
        } else {
            None
        };
        let result = self.flush_fields();
        if let Some(previous) = previous_top {
            self.state.api.borrow_mut().set_top_node(previous);
        }
        result
    }

    fn flush_fields(&mut self) -> Result<(), Error> {
        let class = self.class;
        for (name, prop) in class.properties() {
            self.apply_default(name, prop)?;
        }

        for key in self.flush_order() {
            if let Some(prop) = class.property(&key) {
                self.flush_property(&key, prop)?;
            } else if let Some(slot) = self.children.get_mut(&key) {
                let api = self.state.api.clone();
                for child in slot.as_mut_slice() {
                    child.add_parse_bits(&api)?;
                }
            }
        }
        Ok(())
    }

    /// Fields in `prop_order` first, then scalars in the order they were
    /// set, then the remaining child fields in declaration order.
    fn flush_order(&self) -> Vec<String> {
        let class = self.class;
        let mut order = self.proporder.clone();

        for key in class.prop_order().iter().rev() {
            if let Some(pos) = order.iter().position(|k| k == key) {
                let key = order.remove(pos);
                order.insert(0, key);
            } else if class.child(key).is_some() {
                order.insert(0, key.clone());
            }
        }
        for key in class.children().keys() {
            if !order.contains(key) {
                order.push(key.clone());
            }
        }
        order
    }

    // ========================================================================
    // Clearing
    // ========================================================================

    /// Reset every field.
    ///
    /// A collection member (path ending in `[n]`), or any object when
    /// `leave_stub` is set, keeps an empty element so sibling paths stay
    /// valid; anything else is removed from the document.
    pub fn clear(&mut self, leave_stub: bool) -> Result<(), Error> {
        let root_xpath = self.get_root_xpath();
        let own_path = self.fix_relative_xpath(".");

        let keep_stub = !root_xpath.is_empty() && (ends_with_index(&root_xpath) || leave_stub);

        let previous_top = if keep_stub {
            Some(self.pin_own_node()?)
        } else {
            None
        };
        let result = self.clear_fields();
        if let Some(previous) = previous_top {
            self.state.api.borrow_mut().set_top_node(previous);
        }
        result?;

        if keep_stub {
            let indent = 2 * root_xpath.matches('/').count();
            let mut api = self.state.api.borrow_mut();
            if let Some(node) = api.find(&root_xpath)? {
                api.set_content(&node, &format!("\n{}", " ".repeat(indent)))?;
            }
        } else {
            self.state.api.borrow_mut().node_remove(&own_path, true)?;
        }
        Ok(())
    }

    fn clear_fields(&mut self) -> Result<(), Error> {
        let class = self.class;

        for (name, prop) in class.properties() {
            if let Some(tracker) = &self.tracker {
                tracker.record_write(class, name);
            }
            self.propstore.remove(name);
            self.proporder.retain(|k| k != name);
            let xpath = self.fix_relative_xpath(prop.xpath());
            self.state.api.borrow_mut().node_remove(&xpath, true)?;
        }

        for (name, prop) in class.children() {
            if prop.is_single() {
                if let Some(ChildSlot::Single(child)) = self.children.get_mut(name) {
                    child.clear(false)?;
                }
                continue;
            }
            let ids: Vec<ObjectId> = self
                .children
                .get(name)
                .map(|slot| slot.as_slice().iter().map(|c| c.id).collect())
                .unwrap_or_default();
            for id in ids {
                self.remove_child(id)?;
            }
        }
        Ok(())
    }

    /// Make this object's element the removal sentinel, returning the
    /// previous one. An object with no element leaves the sentinel alone.
    fn pin_own_node(&self) -> Result<Option<NodeId>, Error> {
        let own_path = self.fix_relative_xpath(".");
        let own = self.state.api.borrow().find(&own_path)?.map(|n| n.node_id());
        let mut api = self.state.api.borrow_mut();
        let previous = api.top_node();
        if own.is_some() {
            api.set_top_node(own);
        }
        Ok(previous)
    }

    // ========================================================================
    // Children
    // ========================================================================

    fn find_child_prop(&self, class: ClassRef, return_single: bool) -> Result<&'static str, ConfigError> {
        let owner: &'static XmlClass = self.class;
        for (name, prop) in owner.children() {
            if prop.is_single() && !return_single {
                continue;
            }
            if prop.class_index(class).is_some() {
                return Ok(name.as_str());
            }
        }
        Err(ConfigError::ChildClassNotDeclared {
            class: owner.root_name().to_string(),
            child: class.root_name().to_string(),
        })
    }

    fn slot(&self, name: &str) -> Result<&ChildSlot, ConfigError> {
        self.children
            .get(name)
            .ok_or_else(|| self.class.unknown_field(name))
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut ChildSlot, ConfigError> {
        let class = self.class;
        self.children
            .get_mut(name)
            .ok_or_else(|| class.unknown_field(name))
    }

    /// The object of a singleton child field.
    pub fn child(&self, name: &str) -> Result<&XmlBuilder, Error> {
        match self.slot(name)? {
            ChildSlot::Single(child) => Ok(&**child),
            ChildSlot::List(_) => Err(self.class.unknown_field(name).into()),
        }
    }

    /// Mutable access to a singleton child.
    pub fn child_mut(&mut self, name: &str) -> Result<&mut XmlBuilder, Error> {
        let class = self.class;
        match self.slot_mut(name)? {
            ChildSlot::Single(child) => Ok(&mut **child),
            ChildSlot::List(_) => Err(class.unknown_field(name).into()),
        }
    }

    /// The objects of a child field (one element for a singleton).
    pub fn children(&self, name: &str) -> Result<&[XmlBuilder], Error> {
        Ok(self.slot(name)?.as_slice())
    }

    /// Mutable access to the objects of a child field.
    pub fn children_mut(&mut self, name: &str) -> Result<&mut [XmlBuilder], Error> {
        Ok(self.slot_mut(name)?.as_mut_slice())
    }

    /// A direct child by identity.
    pub fn child_by_id(&self, id: ObjectId) -> Option<&XmlBuilder> {
        self.children
            .values()
            .flat_map(ChildSlot::as_slice)
            .find(|c| c.id == id)
    }

    /// Mutable access to a direct child by identity.
    pub fn child_by_id_mut(&mut self, id: ObjectId) -> Option<&mut XmlBuilder> {
        self.children
            .values_mut()
            .flat_map(ChildSlot::as_mut_slice)
            .find(|c| c.id == id)
    }

    /// Every direct child of `class`, across all child fields.
    pub fn list_children_for_class(&self, class: ClassRef) -> Vec<&XmlBuilder> {
        self.children
            .values()
            .flat_map(ChildSlot::as_slice)
            .filter(|c| same_class(c.class, class))
            .collect()
    }

    /// True if `class` is held by a singleton child field.
    pub fn child_class_is_singleton(&self, class: ClassRef) -> Result<bool, Error> {
        let name = self.find_child_prop(class, true)?;
        Ok(self.class.child(name).is_some_and(|p| p.is_single()))
    }

    /// A fresh build-mode object of the first class of child field `name`.
    pub fn new_child(&self, name: &str) -> Result<XmlBuilder, Error> {
        let prop = self
            .class
            .child(name)
            .ok_or_else(|| self.class.unknown_field(name))?;
        Self::construct(prop.primary_class(), None, self.tracker.clone())
    }

    /// [`new_child`](Self::new_child), appended with
    /// [`add_child`](Self::add_child).
    pub fn add_new(&mut self, name: &str) -> Result<&mut XmlBuilder, Error> {
        let child = self.new_child(name)?;
        self.add_child(child)
    }

    /// Append `child` to the collection that accepts its class.
    ///
    /// A child with real content has its XML spliced into this document.
    /// Either way it then shares this object's document.
    pub fn add_child(&mut self, mut child: XmlBuilder) -> Result<&mut XmlBuilder, Error> {
        let name = self.find_child_prop(child.class, false)?;
        let class = self.class;
        let xml = child.get_xml_config()?;
        let id = child.id;
        let child_is_build = child.state.is_build;

        match (class.child(name), self.children.get_mut(name)) {
            (Some(prop), Some(ChildSlot::List(list))) => prop.append(list, child),
            _ => {
                return Err(ConfigError::ChildClassNotDeclared {
                    class: class.root_name().to_string(),
                    child: child.class.root_name().to_string(),
                }
                .into());
            }
        }
        self.set_child_xpaths()?;

        let root_xpath = self
            .child_by_id(id)
            .map(XmlBuilder::get_root_xpath)
            .unwrap_or_default();

        if !child_is_build && !xml.is_empty() {
            let parent_path = Path::parse(&root_xpath)
                .ok()
                .and_then(|p| p.parent())
                .map(|p| p.to_string())
                .unwrap_or_else(|| ".".to_string());
            let indent = 2 * root_xpath.matches('/').count();

            let mut api = self.state.api.borrow_mut();
            let node = api.import_xml(&xml_indent(&xml, indent))?;
            let parent = api.node_make_stub(&parent_path)?;
            api.node_add_child(parent.node_id(), node);
        }

        debug!(child = %id, path = %root_xpath, "added child");
        let api = self.state.api.clone();
        let is_build = self.state.is_build;
        let child = self.child_by_id_mut(id).ok_or_else(|| ConfigError::UnknownField {
            class: class.root_name().to_string(),
            field: name.to_string(),
        })?;
        child.adopt(&api, is_build);
        Ok(child)
    }

    /// Take a collection member out of this object.
    ///
    /// The child keeps its data: it becomes a root object holding its own
    /// copy of its former XML, and the element it came from is freed from
    /// this document. Returns `None` if `id` is not a collection
    /// member of this object.
    pub fn remove_child(&mut self, id: ObjectId) -> Result<Option<XmlBuilder>, Error> {
        let Some((name, pos)) = self.locate_child(id) else {
            return Ok(None);
        };

        let (xpath, xml) = match self.children.get_mut(&name) {
            Some(ChildSlot::List(list)) => {
                let child = &mut list[pos];
                (child.get_root_xpath(), child.get_xml_config()?)
            }
            _ => return Ok(None),
        };
        let mut child = match self.children.get_mut(&name) {
            Some(ChildSlot::List(list)) => list.remove(pos),
            _ => return Ok(None),
        };

        child.set_parent_xpath("");
        child.set_relative_object_xpath("");
        child.detach(&xml)?;

        self.state.api.borrow_mut().node_remove(&xpath, true)?;
        self.set_child_xpaths()?;
        debug!(child = %id, path = %xpath, "removed child");
        Ok(Some(child))
    }

    fn locate_child(&self, id: ObjectId) -> Option<(String, usize)> {
        self.children.iter().find_map(|(name, slot)| match slot {
            ChildSlot::List(list) => list
                .iter()
                .position(|c| c.id == id)
                .map(|pos| (name.clone(), pos)),
            ChildSlot::Single(_) => None,
        })
    }

    /// Share `api` from now on, with this whole subtree.
    fn adopt(&mut self, api: &SharedXmlApi, parent_is_build: bool) {
        register_namespaces(self.class, api);
        self.state.api = api.clone();
        self.state.is_build = parent_is_build || self.state.is_build;
        let is_build = self.state.is_build;
        for slot in self.children.values_mut() {
            for child in slot.as_mut_slice() {
                child.adopt(api, is_build);
            }
        }
    }

    /// Become a root object backed by a private parse of `xml`.
    fn detach(&mut self, xml: &str) -> Result<(), Error> {
        let text = Some(xml).filter(|x| !x.is_empty());
        let api = SharedXmlApi::new(root_api(self.class, text)?);
        self.state.api = api.clone();
        let is_build = self.state.is_build;
        for slot in self.children.values_mut() {
            for child in slot.as_mut_slice() {
                child.adopt(&api, is_build);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Run the class's whole-object validation.
    pub fn validate(&self) -> Result<(), Error> {
        match self.class.hooks() {
            Some(hooks) => hooks.validate(self),
            None => Ok(()),
        }
    }

    /// Run the class's default-filling hook.
    pub fn set_defaults(&mut self) -> Result<(), Error> {
        match self.class.hooks().cloned() {
            Some(hooks) => hooks.set_defaults(self),
            None => Ok(()),
        }
    }
}

impl Clone for XmlBuilder {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Parse `xml` (or the class stub) into a document that knows the class's
/// namespaces.
fn root_api(class: &XmlClass, xml: Option<&str>) -> Result<XmlApi, Error> {
    let text = match xml {
        Some(text) => text.to_string(),
        None => make_xml_stub(class.root_name(), class.namespaces()),
    };
    let mut api = XmlApi::parse(&text).map_err(|e| {
        debug!("error parsing xml=\n{}", text);
        Error::Parse(e)
    })?;
    for (prefix, uri) in class.namespaces().iter() {
        api.register_namespace(prefix, uri);
    }
    Ok(api)
}

fn register_namespaces(class: &XmlClass, api: &SharedXmlApi) {
    let mut api = api.borrow_mut();
    for (prefix, uri) in class.namespaces().iter() {
        if api.namespaces().uri(prefix) != Some(uri) {
            api.register_namespace(prefix, uri);
        }
    }
}

/// True for paths like `./devices/disk[3]`.
fn ends_with_index(path: &str) -> bool {
    path.strip_suffix(']')
        .and_then(|p| p.rsplit_once('['))
        .is_some_and(|(_, digits)| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
