//! Entity records and query patterns exchanged with the store.
//!
//! An [`Entity`] is the resolved-string view of one stored row: an identifier
//! (URI-like), a single type, literal attributes and outgoing links to other
//! identifiers. Link targets are plain identifiers and may live in any
//! context of the reader's chain.

use serde::{Deserialize, Serialize};

/// A stored entity with resolved strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub ident: String,
    pub entity_type: String,
    /// Literal attributes, single-valued per key, in insertion order.
    pub attrs: Vec<(String, String)>,
    /// Outgoing links `(relation, target ident)`, multi-valued, in insertion order.
    pub links: Vec<(String, String)>,
}

impl Entity {
    pub fn new(ident: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            entity_type: entity_type.into(),
            attrs: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Set an attribute, replacing any previous value for the same key.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
        self
    }

    /// Add a link. Adding the same `(relation, target)` twice is a no-op.
    pub fn with_link(mut self, rel: impl Into<String>, target: impl Into<String>) -> Self {
        let rel = rel.into();
        let target = target.into();
        if !self.links.iter().any(|(r, t)| *r == rel && *t == target) {
            self.links.push((rel, target));
        }
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All link targets for `rel`, in insertion order.
    pub fn links<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.links
            .iter()
            .filter(move |(r, _)| r == rel)
            .map(|(_, t)| t.as_str())
    }

    /// First link target for `rel`.
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.links
            .iter()
            .find(|(r, _)| r == rel)
            .map(|(_, t)| t.as_str())
    }
}

/// A conjunctive entity shape.
///
/// - `types`: the entity type must be one of these (empty = any type)
/// - `attrs`: every `(key, value)` must match exactly
/// - `links`: every `(relation, target)` edge must be present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    pub types: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub links: Vec<(String, String)>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, entity_type: impl Into<String>) -> Self {
        self.types.push(entity_type.into());
        self
    }

    pub fn of_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_link(mut self, rel: impl Into<String>, target: impl Into<String>) -> Self {
        self.links.push((rel.into(), target.into()));
        self
    }

    /// Check an already-materialized entity against this pattern.
    pub fn matches(&self, entity: &Entity) -> bool {
        (self.types.is_empty() || self.types.iter().any(|t| *t == entity.entity_type))
            && self
                .attrs
                .iter()
                .all(|(k, v)| entity.attr(k) == Some(v.as_str()))
            && self
                .links
                .iter()
                .all(|(r, t)| entity.links(r).any(|target| target == t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_attr_replaces_existing_key() {
        let e = Entity::new("x", "T").with_attr("name", "a").with_attr("name", "b");
        assert_eq!(e.attrs.len(), 1);
        assert_eq!(e.attr("name"), Some("b"));
    }

    #[test]
    fn with_link_keeps_order_and_skips_duplicates() {
        let e = Entity::new("x", "T")
            .with_link("capability", "c2")
            .with_link("capability", "c1")
            .with_link("capability", "c2");
        let caps: Vec<&str> = e.links("capability").collect();
        assert_eq!(caps, vec!["c2", "c1"]);
    }

    #[test]
    fn link_borrows_from_entity_only() {
        let e = Entity::new("x", "T").with_link("module", "m1");
        let target = {
            let rel = String::from("module");
            e.link(&rel)
        };
        assert_eq!(target, Some("m1"));
        assert_eq!(e.link("missing"), None);
    }

    #[test]
    fn pattern_matches_type_attr_and_link() {
        let e = Entity::new("m", "Model")
            .with_attr("name", "foo")
            .with_link("subclass_of", "Base");
        assert!(Pattern::new().of_type("Model").matches(&e));
        assert!(Pattern::new().of_types(["Other", "Model"]).matches(&e));
        assert!(Pattern::new().with_attr("name", "foo").matches(&e));
        assert!(Pattern::new().with_link("subclass_of", "Base").matches(&e));
        assert!(!Pattern::new().with_link("subclass_of", "Other").matches(&e));
        assert!(!Pattern::new().of_type("Test").matches(&e));
    }
}
