//! Instrumentation recording which declared properties an object graph
//! actually touched.
//!
//! Pass a tracker to [`XmlBuilder::new_tracked`](crate::XmlBuilder::new_tracked)
//! and every object of the graph (children included) registers its class's
//! properties and reports reads and writes. A test suite can then assert
//! that each declared property was exercised.

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::class::XmlClass;

/// Read/write counters of one property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyUse {
    /// Number of reads.
    pub reads: usize,
    /// Number of writes.
    pub writes: usize,
}

impl PropertyUse {
    /// True if the property was never read nor written.
    pub fn is_unseen(&self) -> bool {
        self.reads == 0 && self.writes == 0
    }
}

/// Shared property usage record, keyed `root_name.field`.
#[derive(Debug, Default)]
pub struct PropertyTracker {
    uses: RefCell<IndexMap<String, PropertyUse>>,
}

impl PropertyTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every scalar property of `class`.
    pub fn declare(&self, class: &XmlClass) {
        let mut uses = self.uses.borrow_mut();
        for name in class.properties().keys() {
            uses.entry(key(class, name)).or_default();
        }
    }

    pub(crate) fn record_read(&self, class: &XmlClass, field: &str) {
        self.uses
            .borrow_mut()
            .entry(key(class, field))
            .or_default()
            .reads += 1;
    }

    pub(crate) fn record_write(&self, class: &XmlClass, field: &str) {
        self.uses
            .borrow_mut()
            .entry(key(class, field))
            .or_default()
            .writes += 1;
    }

    /// Usage of one property.
    pub fn usage(&self, class: &XmlClass, field: &str) -> Option<PropertyUse> {
        self.uses.borrow().get(&key(class, field)).copied()
    }

    /// Declared properties that were never touched, in registration order.
    pub fn unseen(&self) -> Vec<String> {
        self.uses
            .borrow()
            .iter()
            .filter(|(_, u)| u.is_unseen())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

fn key(class: &XmlClass, field: &str) -> String {
    format!("{}.{field}", class.root_name())
}
