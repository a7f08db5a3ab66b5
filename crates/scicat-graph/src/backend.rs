//! The entity contract the catalog engine consumes.
//!
//! The engine never sees partitions, rows or interned ids: it writes whole
//! entities into one context and reads through an ordered context chain.

use anyhow::Result;

use crate::entity::{Entity, Pattern};

/// A persisted, context-partitioned entity graph.
///
/// Reads take a `chain`: the reader's own context followed by everything it
/// imports (directly or transitively), in precedence order. When the same
/// identifier is present in several contexts of the chain, the earliest wins.
pub trait GraphBackend {
    /// Write `entity` into `context`, replacing any entity with the same
    /// identifier in that context.
    fn put(&mut self, context: &str, entity: &Entity) -> Result<()>;

    /// Look up `ident` through `chain`.
    fn get(&self, ident: &str, chain: &[String]) -> Result<Option<Entity>>;

    /// All entities visible through `chain` matching `pattern`, in store order
    /// (chain order first, then first-write order within a context).
    fn query(&self, chain: &[String], pattern: &Pattern) -> Result<Vec<Entity>>;

    /// Replace the recorded import edges of `context`.
    fn put_imports(&mut self, context: &str, imports: &[String]) -> Result<()>;

    /// The recorded import edges of `context` (empty if none were saved).
    fn imports(&self, context: &str) -> Result<Vec<String>>;
}
