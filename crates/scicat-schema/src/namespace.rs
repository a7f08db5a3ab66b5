//! Prefix bindings for abbreviated identifiers (`sciunit:RunnableModel`).

use indexmap::IndexMap;

use crate::vocab::{BASE_NU_SCHEMA_NS, BASE_SCHEMA_NS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceManager {
    bindings: IndexMap<String, String>,
}

impl Default for NamespaceManager {
    fn default() -> Self {
        let mut bindings = IndexMap::new();
        bindings.insert("sciunit".to_string(), BASE_SCHEMA_NS.to_string());
        bindings.insert("neuronunit".to_string(), BASE_NU_SCHEMA_NS.to_string());
        Self { bindings }
    }
}

impl NamespaceManager {
    pub fn empty() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    pub fn from_bindings(bindings: &IndexMap<String, String>) -> Self {
        Self {
            bindings: bindings.clone(),
        }
    }

    pub fn bind(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.bindings.insert(prefix.into(), namespace.into());
    }

    /// `prefix:local` using the longest matching namespace; the identifier
    /// unchanged if none matches.
    pub fn abbreviate(&self, ident: &str) -> String {
        self.bindings
            .iter()
            .filter(|(_, ns)| !ns.is_empty() && ident.starts_with(ns.as_str()))
            .max_by_key(|(_, ns)| ns.len())
            .map(|(prefix, ns)| format!("{prefix}:{}", &ident[ns.len()..]))
            .unwrap_or_else(|| ident.to_string())
    }

    /// Inverse of [`Self::abbreviate`] for bound prefixes.
    pub fn expand(&self, curie: &str) -> String {
        curie
            .split_once(':')
            .and_then(|(prefix, local)| self.bindings.get(prefix).map(|ns| format!("{ns}{local}")))
            .unwrap_or_else(|| curie.to_string())
    }
}
