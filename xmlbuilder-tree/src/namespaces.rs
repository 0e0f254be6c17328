//! Prefix to URI registry consulted when paths use `prefix:name` segments.

use indexmap::IndexMap;

/// URI of the libvirt QEMU command-line namespace.
pub const QEMU_NAMESPACE: &str = "http://libvirt.org/schemas/domain/qemu/1.0";

/// Known namespace prefixes.
///
/// Path matching compares namespace URIs, not prefixes, so a document that
/// binds the same URI to another prefix still matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    prefixes: IndexMap<String, String>,
}

impl Namespaces {
    /// A registry with no prefixes at all.
    pub fn empty() -> Self {
        Self {
            prefixes: IndexMap::new(),
        }
    }

    /// Register (or rebind) a prefix.
    pub fn register(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), uri.into());
    }

    /// The URI bound to `prefix`.
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// All registered bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

impl Default for Namespaces {
    /// Preloaded with the `qemu` prefix.
    fn default() -> Self {
        let mut ns = Self::empty();
        ns.register("qemu", QEMU_NAMESPACE);
        ns
    }
}
