//! Contexts: named, importable partitions of the catalog.
//!
//! The registry is an explicit object, never ambient global state. Import
//! edges form a DAG kept in a `petgraph` map; an edge `a → b` means "`a`
//! reads from `b`". A context becomes frozen once saved and accepts no new
//! descriptors, imports or staged records afterwards.

use std::collections::HashMap;

use indexmap::IndexSet;
use parking_lot::RwLock;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use tracing::debug;

use crate::descriptor::ClassDescriptor;
use crate::error::{SchemaError, SchemaResult};
use crate::model::ModelRecord;
use crate::testing::TestRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
struct Context {
    uri: String,
    imports: Vec<ContextId>,
    frozen: bool,
    descriptors: IndexSet<ClassDescriptor>,
    models: Vec<ModelRecord>,
    tests: Vec<TestRecord>,
}

#[derive(Default)]
struct Inner {
    slots: Vec<Option<Context>>,
    by_uri: HashMap<String, ContextId>,
    graph: DiGraphMap<ContextId, ()>,
}

impl Inner {
    fn ctx(&self, id: ContextId) -> SchemaResult<&Context> {
        self.slots
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| SchemaError::UnknownContext(format!("#{}", id.0)))
    }

    fn ctx_mut(&mut self, id: ContextId) -> SchemaResult<&mut Context> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| SchemaError::UnknownContext(format!("#{}", id.0)))
    }

    fn writable(&mut self, id: ContextId) -> SchemaResult<&mut Context> {
        let ctx = self.ctx_mut(id)?;
        if ctx.frozen {
            return Err(SchemaError::ContextFrozen(ctx.uri.clone()));
        }
        Ok(ctx)
    }
}

/// Owner of every context of one catalog session.
#[derive(Default)]
pub struct ContextRegistry {
    inner: RwLock<Inner>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_context(&self, uri: &str) -> SchemaResult<ContextId> {
        let mut inner = self.inner.write();
        if inner.by_uri.contains_key(uri) {
            return Err(SchemaError::ContextExists(uri.to_string()));
        }
        let id = ContextId(inner.slots.len() as u32);
        inner.slots.push(Some(Context {
            uri: uri.to_string(),
            imports: Vec::new(),
            frozen: false,
            descriptors: IndexSet::new(),
            models: Vec::new(),
            tests: Vec::new(),
        }));
        inner.by_uri.insert(uri.to_string(), id);
        inner.graph.add_node(id);
        debug!(context = uri, "context created");
        Ok(id)
    }

    pub fn lookup(&self, uri: &str) -> Option<ContextId> {
        self.inner.read().by_uri.get(uri).copied()
    }

    pub fn uri(&self, id: ContextId) -> SchemaResult<String> {
        Ok(self.inner.read().ctx(id)?.uri.clone())
    }

    pub fn is_frozen(&self, id: ContextId) -> SchemaResult<bool> {
        Ok(self.inner.read().ctx(id)?.frozen)
    }

    /// Declare that `ctx` reads from `other`. Re-declaring is a no-op.
    pub fn import_from(&self, ctx: ContextId, other: ContextId) -> SchemaResult<()> {
        let mut inner = self.inner.write();
        let other_uri = inner.ctx(other)?.uri.clone();
        let ctx_uri = inner.ctx(ctx)?.uri.clone();
        if inner.ctx(ctx)?.imports.contains(&other) {
            return Ok(());
        }
        if ctx == other || has_path_connecting(&inner.graph, other, ctx, None) {
            return Err(SchemaError::Cycle {
                context: ctx_uri,
                imported: other_uri,
            });
        }
        inner.writable(ctx)?.imports.push(other);
        inner.graph.add_edge(ctx, other, ());
        Ok(())
    }

    /// Direct imports in declaration order.
    pub fn imports(&self, ctx: ContextId) -> SchemaResult<Vec<ContextId>> {
        Ok(self.inner.read().ctx(ctx)?.imports.clone())
    }

    /// Read chain: `ctx` itself, then its imports depth-first in declaration
    /// order, each context once.
    pub fn chain_ids(&self, ctx: ContextId) -> SchemaResult<Vec<ContextId>> {
        let inner = self.inner.read();
        Self::walk(&inner, ctx).map(|seen| seen.into_iter().collect())
    }

    /// [`Self::chain_ids`] as context URIs, the form the store reads with.
    pub fn chain(&self, ctx: ContextId) -> SchemaResult<Vec<String>> {
        let inner = self.inner.read();
        Self::walk(&inner, ctx)?
            .into_iter()
            .map(|id| inner.ctx(id).map(|c| c.uri.clone()))
            .collect()
    }

    fn walk(inner: &Inner, ctx: ContextId) -> SchemaResult<IndexSet<ContextId>> {
        let mut seen = IndexSet::new();
        let mut stack = vec![ctx];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            stack.extend(inner.ctx(id)?.imports.iter().rev().copied());
        }
        Ok(seen)
    }

    /// Record `descriptor` in `ctx`, returning the stored one if the
    /// `(name, module)` pair is already present.
    pub fn describe(&self, ctx: ContextId, descriptor: &ClassDescriptor) -> SchemaResult<ClassDescriptor> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.ctx(ctx)?.descriptors.get(descriptor) {
            return Ok(existing.clone());
        }
        let context = inner.writable(ctx)?;
        context.descriptors.insert(descriptor.clone());
        debug!(context = %context.uri, descriptor = %descriptor, "descriptor created");
        Ok(descriptor.clone())
    }

    pub fn descriptors(&self, ctx: ContextId) -> SchemaResult<Vec<ClassDescriptor>> {
        Ok(self.inner.read().ctx(ctx)?.descriptors.iter().cloned().collect())
    }

    pub fn stage_model(&self, ctx: ContextId, record: ModelRecord) -> SchemaResult<()> {
        self.inner.write().writable(ctx)?.models.push(record);
        Ok(())
    }

    pub fn stage_test(&self, ctx: ContextId, record: TestRecord) -> SchemaResult<()> {
        self.inner.write().writable(ctx)?.tests.push(record);
        Ok(())
    }

    pub fn staged_models(&self, ctx: ContextId) -> SchemaResult<Vec<ModelRecord>> {
        Ok(self.inner.read().ctx(ctx)?.models.clone())
    }

    pub fn staged_tests(&self, ctx: ContextId) -> SchemaResult<Vec<TestRecord>> {
        Ok(self.inner.read().ctx(ctx)?.tests.clone())
    }

    pub(crate) fn freeze(&self, ctx: ContextId) -> SchemaResult<()> {
        self.inner.write().ctx_mut(ctx)?.frozen = true;
        Ok(())
    }

    /// Remove a context nothing imports any more.
    pub fn drop_context(&self, ctx: ContextId) -> SchemaResult<()> {
        let mut inner = self.inner.write();
        let uri = inner.ctx(ctx)?.uri.clone();
        if let Some(importer) = inner
            .graph
            .neighbors_directed(ctx, Direction::Incoming)
            .next()
        {
            let importer = inner.ctx(importer)?.uri.clone();
            return Err(SchemaError::ContextInUse {
                context: uri,
                importer,
            });
        }
        inner.graph.remove_node(ctx);
        inner.by_uri.remove(&uri);
        inner.slots[ctx.0 as usize] = None;
        debug!(context = %uri, "context dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_cycle_is_rejected_on_second_call() {
        let reg = ContextRegistry::new();
        let a = reg.new_context("urn:a").unwrap();
        let b = reg.new_context("urn:b").unwrap();

        reg.import_from(a, b).unwrap();
        let err = reg.import_from(b, a).unwrap_err();
        assert!(matches!(err, SchemaError::Cycle { .. }));
        assert!(matches!(reg.import_from(a, a), Err(SchemaError::Cycle { .. })));
    }

    #[test]
    fn chain_is_depth_first_without_repeats() {
        let reg = ContextRegistry::new();
        let top = reg.new_context("urn:top").unwrap();
        let left = reg.new_context("urn:left").unwrap();
        let right = reg.new_context("urn:right").unwrap();
        let base = reg.new_context("urn:base").unwrap();
        reg.import_from(left, base).unwrap();
        reg.import_from(right, base).unwrap();
        reg.import_from(top, left).unwrap();
        reg.import_from(top, right).unwrap();

        assert_eq!(
            reg.chain(top).unwrap(),
            vec!["urn:top", "urn:left", "urn:base", "urn:right"]
        );
    }

    #[test]
    fn describe_is_idempotent_and_respects_freeze() {
        let reg = ContextRegistry::new();
        let ctx = reg.new_context("urn:ctx").unwrap();
        let d = ClassDescriptor::new("m", "C");

        let first = reg.describe(ctx, &d).unwrap();
        let second = reg.describe(ctx, &d).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.descriptors(ctx).unwrap().len(), 1);

        reg.freeze(ctx).unwrap();
        assert!(reg.describe(ctx, &d).is_ok());
        assert!(matches!(
            reg.describe(ctx, &ClassDescriptor::new("m", "D")),
            Err(SchemaError::ContextFrozen(_))
        ));
    }

    #[test]
    fn imported_context_cannot_be_dropped() {
        let reg = ContextRegistry::new();
        let a = reg.new_context("urn:a").unwrap();
        let b = reg.new_context("urn:b").unwrap();
        reg.import_from(a, b).unwrap();

        assert!(matches!(
            reg.drop_context(b),
            Err(SchemaError::ContextInUse { .. })
        ));
        reg.drop_context(a).unwrap();
        reg.drop_context(b).unwrap();
        assert!(reg.lookup("urn:b").is_none());
        assert!(reg.uri(a).is_err());
        assert!(reg.new_context("urn:a").is_ok());
    }

    #[test]
    fn duplicate_uri_is_rejected() {
        let reg = ContextRegistry::new();
        reg.new_context("urn:x").unwrap();
        assert!(matches!(
            reg.new_context("urn:x"),
            Err(SchemaError::ContextExists(_))
        ));
    }
}
