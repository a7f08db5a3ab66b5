//! scicat-graph: a context-partitioned entity graph store.
//!
//! This is the persistence collaborator behind the scicat type catalog:
//!
//! 1. **String Interning**: every identifier, type, key and value is stored
//!    once and referenced by a `u32` [`StrId`]
//! 2. **Context Partitions**: each named context owns its own rows; readers
//!    see a context plus the contexts it imports, never more
//! 3. **Bitmap Indexes**: type / attribute / link lookups are Roaring bitmap
//!    intersections over partition rows
//! 4. **Binary Snapshots**: the whole store round-trips through a compact
//!    `.scpd` file so a later process can reopen the catalog
//!
//! The engine talks to the store only through [`GraphBackend`].

pub mod backend;
pub mod entity;
mod partition;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{anyhow, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

pub use backend::GraphBackend;
pub use entity::{Entity, Pattern};

use partition::{InternedPattern, Partition, Row};

// ============================================================================
// String Interning
// ============================================================================

/// Interned string ID (4 bytes instead of 24+ for String)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct StrId(u32);

impl StrId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// String interner: maps strings to compact IDs
pub struct StringInterner {
    str_to_id: DashMap<String, StrId>,
    id_to_str: DashMap<StrId, String>,
    next_id: AtomicU32,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            str_to_id: DashMap::new(),
            id_to_str: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a string, returning its ID
    pub fn intern(&self, s: &str) -> StrId {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }

        // Ids are allocated only under the vacant entry's shard lock.
        match self.str_to_id.entry(s.to_string()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let id = StrId(self.next_id.fetch_add(1, Ordering::SeqCst));
                self.id_to_str.insert(id, s.to_string());
                e.insert(id);
                id
            }
        }
    }

    /// Look up an existing ID for a string without inserting.
    pub fn id_of(&self, s: &str) -> Option<StrId> {
        self.str_to_id.get(s).map(|id| *id)
    }

    /// Look up string by ID
    pub fn lookup(&self, id: StrId) -> Option<String> {
        self.id_to_str.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize to bytes (strings in id order).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let strings: Vec<String> = (0..self.next_id.load(Ordering::SeqCst))
            .map(|i| {
                self.lookup(StrId(i))
                    .ok_or_else(|| anyhow!("interner hole at id {i}"))
            })
            .collect::<Result<_>>()?;
        Ok(bincode::serialize(&strings)?)
    }

    /// Deserialize from bytes. Ids are reassigned in order, so they match the
    /// ids of the interner that produced the bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let strings: Vec<String> = bincode::deserialize(bytes)?;
        let interner = Self::new();
        for (expected, s) in strings.iter().enumerate() {
            let id = interner.intern(s);
            if id.raw() as usize != expected {
                return Err(anyhow!("duplicate interned string {s:?} in snapshot"));
            }
        }
        Ok(interner)
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// GraphStore
// ============================================================================

const SNAPSHOT_MAGIC: &[u8; 4] = b"SCPD";
const SNAPSHOT_VERSION: u32 = 1;

/// In-memory, snapshot-persisted implementation of [`GraphBackend`].
#[derive(Default)]
pub struct GraphStore {
    interner: StringInterner,
    partitions: HashMap<StrId, Partition>,
    imports: HashMap<StrId, Vec<StrId>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context identifiers that have at least one stored entity or import
    /// edge, sorted.
    pub fn contexts(&self) -> Vec<String> {
        let mut ids: HashSet<StrId> = self.partitions.keys().copied().collect();
        ids.extend(self.imports.keys().copied());
        let mut out: Vec<String> = ids
            .into_iter()
            .filter_map(|id| self.interner.lookup(id))
            .collect();
        out.sort();
        out
    }

    /// Number of entities owned by `context` (not counting imports).
    pub fn entity_count(&self, context: &str) -> usize {
        self.interner
            .id_of(context)
            .and_then(|id| self.partitions.get(&id))
            .map(Partition::len)
            .unwrap_or(0)
    }

    fn chain_ids(&self, chain: &[String]) -> Vec<StrId> {
        chain
            .iter()
            .filter_map(|c| self.interner.id_of(c))
            .collect()
    }

    fn resolve(&self, id: StrId) -> Result<String> {
        self.interner
            .lookup(id)
            .ok_or_else(|| anyhow!("dangling string id {}", id.raw()))
    }

    fn row_to_entity(&self, row: &Row) -> Result<Entity> {
        let pairs = |pairs: &[(StrId, StrId)]| -> Result<Vec<(String, String)>> {
            pairs
                .iter()
                .map(|&(k, v)| Ok((self.resolve(k)?, self.resolve(v)?)))
                .collect()
        };
        Ok(Entity {
            ident: self.resolve(row.ident)?,
            entity_type: self.resolve(row.entity_type)?,
            attrs: pairs(&row.attrs)?,
            links: pairs(&row.links)?,
        })
    }

    /// Intern a pattern without growing the interner. `None` means the
    /// pattern references a string the store has never seen, so nothing can
    /// match.
    fn intern_pattern(&self, pattern: &Pattern) -> Option<InternedPattern> {
        let types = if pattern.types.is_empty() {
            None
        } else {
            let known: Vec<StrId> = pattern
                .types
                .iter()
                .filter_map(|t| self.interner.id_of(t))
                .collect();
            if known.is_empty() {
                return None;
            }
            Some(known)
        };

        let pair = |(a, b): &(String, String)| -> Option<(StrId, StrId)> {
            Some((self.interner.id_of(a)?, self.interner.id_of(b)?))
        };
        let attrs = pattern.attrs.iter().map(pair).collect::<Option<Vec<_>>>()?;
        let links = pattern.links.iter().map(pair).collect::<Option<Vec<_>>>()?;

        Some(InternedPattern {
            types,
            attrs,
            links,
        })
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Serialize to the binary snapshot format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let interner_bytes = self.interner.to_bytes()?;
        let body = bincode::serialize(&(&self.partitions, &self.imports))?;

        let mut result = Vec::with_capacity(24 + interner_bytes.len() + body.len());
        result.extend_from_slice(SNAPSHOT_MAGIC);
        result.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());

        result.extend_from_slice(&(interner_bytes.len() as u64).to_le_bytes());
        result.extend_from_slice(&interner_bytes);

        result.extend_from_slice(&(body.len() as u64).to_le_bytes());
        result.extend_from_slice(&body);

        Ok(result)
    }

    /// Deserialize from the binary snapshot format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(anyhow!("invalid catalog snapshot"));
        }

        let version = u32::from_le_bytes(bytes[4..8].try_into()?);
        if version != SNAPSHOT_VERSION {
            return Err(anyhow!("unsupported catalog snapshot version: {version}"));
        }

        let mut offset = 8;
        let interner_bytes = read_section(bytes, &mut offset)?;
        let interner = StringInterner::from_bytes(interner_bytes)?;
        let body_bytes = read_section(bytes, &mut offset)?;
        let (partitions, imports): (HashMap<StrId, Partition>, HashMap<StrId, Vec<StrId>>) =
            bincode::deserialize(body_bytes)?;

        Ok(Self {
            interner,
            partitions,
            imports,
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)
            .map_err(|e| anyhow!("failed to write snapshot {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote catalog snapshot");
        Ok(())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| anyhow!("failed to read snapshot {}: {e}", path.display()))?;
        Self::from_bytes(&bytes)
    }

    /// Open the snapshot at `path`, or start empty if the file does not exist.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::new())
        }
    }
}

fn read_section<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let truncated = || anyhow!("truncated catalog snapshot");
    let len_end = offset.checked_add(8).ok_or_else(truncated)?;
    let len_bytes = bytes.get(*offset..len_end).ok_or_else(truncated)?;
    let len = usize::try_from(u64::from_le_bytes(len_bytes.try_into()?))
        .map_err(|_| truncated())?;
    let end = len_end.checked_add(len).ok_or_else(truncated)?;
    let section = bytes.get(len_end..end).ok_or_else(truncated)?;
    *offset = end;
    Ok(section)
}

impl GraphBackend for GraphStore {
    fn put(&mut self, context: &str, entity: &Entity) -> Result<()> {
        if context.is_empty() {
            return Err(anyhow!("cannot write into an unnamed context"));
        }
        if entity.ident.is_empty() {
            return Err(anyhow!("cannot store an entity without an identifier"));
        }

        let intern_pairs = |pairs: &[(String, String)]| -> Vec<(StrId, StrId)> {
            pairs
                .iter()
                .map(|(a, b)| (self.interner.intern(a), self.interner.intern(b)))
                .collect()
        };
        let row = Row {
            ident: self.interner.intern(&entity.ident),
            entity_type: self.interner.intern(&entity.entity_type),
            attrs: intern_pairs(&entity.attrs),
            links: intern_pairs(&entity.links),
        };

        let ctx_id = self.interner.intern(context);
        self.partitions.entry(ctx_id).or_default().upsert(row);
        Ok(())
    }

    fn get(&self, ident: &str, chain: &[String]) -> Result<Option<Entity>> {
        let Some(ident_id) = self.interner.id_of(ident) else {
            return Ok(None);
        };
        for ctx in self.chain_ids(chain) {
            if let Some(row) = self.partitions.get(&ctx).and_then(|p| p.get(ident_id)) {
                return self.row_to_entity(row).map(Some);
            }
        }
        Ok(None)
    }

    fn query(&self, chain: &[String], pattern: &Pattern) -> Result<Vec<Entity>> {
        let Some(interned) = self.intern_pattern(pattern) else {
            return Ok(Vec::new());
        };

        let partitions: Vec<&Partition> = self
            .chain_ids(chain)
            .iter()
            .filter_map(|ctx| self.partitions.get(ctx))
            .collect();

        let mut out = Vec::new();
        for (i, partition) in partitions.iter().enumerate() {
            for row in partition.matching(&interned) {
                // Shadowed by an earlier context of the chain.
                if partitions[..i].iter().any(|p| p.get(row.ident).is_some()) {
                    continue;
                }
                out.push(self.row_to_entity(row)?);
            }
        }
        Ok(out)
    }

    fn put_imports(&mut self, context: &str, imports: &[String]) -> Result<()> {
        if context.is_empty() {
            return Err(anyhow!("cannot record imports for an unnamed context"));
        }
        let ctx_id = self.interner.intern(context);
        let ids = imports.iter().map(|i| self.interner.intern(i)).collect();
        self.imports.insert(ctx_id, ids);
        Ok(())
    }

    fn imports(&self, context: &str) -> Result<Vec<String>> {
        let Some(ctx_id) = self.interner.id_of(context) else {
            return Ok(Vec::new());
        };
        self.imports
            .get(&ctx_id)
            .map(|ids| ids.iter().map(|&id| self.resolve(id)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn interner_round_trip_preserves_ids() {
        let interner = StringInterner::new();
        let a = interner.intern("alpha");
        let b = interner.intern("beta");
        assert_eq!(interner.intern("alpha"), a);

        let restored = StringInterner::from_bytes(&interner.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.id_of("alpha"), Some(a));
        assert_eq!(restored.id_of("beta"), Some(b));
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn get_prefers_earlier_context_in_chain() {
        let mut store = GraphStore::new();
        store
            .put("ctx:a", &Entity::new("e", "T").with_attr("v", "a"))
            .unwrap();
        store
            .put("ctx:b", &Entity::new("e", "T").with_attr("v", "b"))
            .unwrap();

        let got = store.get("e", &chain(&["ctx:b", "ctx:a"])).unwrap().unwrap();
        assert_eq!(got.attr("v"), Some("b"));
        let got = store.get("e", &chain(&["ctx:a"])).unwrap().unwrap();
        assert_eq!(got.attr("v"), Some("a"));
        assert!(store.get("e", &chain(&["ctx:c"])).unwrap().is_none());
    }

    #[test]
    fn query_with_unknown_strings_is_empty() {
        let mut store = GraphStore::new();
        store.put("ctx", &Entity::new("e", "T")).unwrap();
        let pattern = Pattern::new().with_attr("never", "seen");
        assert!(store.query(&chain(&["ctx"]), &pattern).unwrap().is_empty());
        let pattern = Pattern::new().of_type("Unknown");
        assert!(store.query(&chain(&["ctx"]), &pattern).unwrap().is_empty());
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let mut store = GraphStore::new();
        store.put("ctx", &Entity::new("e", "T")).unwrap();
        let bytes = store.to_bytes().unwrap();
        let err = GraphStore::from_bytes(&bytes[..bytes.len() - 3]);
        assert!(err.is_err());
        assert!(GraphStore::from_bytes(b"NOPE").is_err());

        let mut huge = Vec::new();
        huge.extend_from_slice(SNAPSHOT_MAGIC);
        huge.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        huge.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = GraphStore::from_bytes(&huge).err().unwrap();
        assert!(err.to_string().contains("truncated"));

        let mut header_only = Vec::new();
        header_only.extend_from_slice(SNAPSHOT_MAGIC);
        header_only.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        header_only.extend_from_slice(&3u64.to_le_bytes());
        assert!(GraphStore::from_bytes(&header_only).is_err());
    }

    #[test]
    fn concurrent_interning_leaves_no_holes() {
        let interner = StringInterner::new();
        std::thread::scope(|s| {
            for t in 0..8 {
                let interner = &interner;
                s.spawn(move || {
                    for i in 0..200 {
                        interner.intern(&format!("s{}", (i * 7 + t) % 150));
                    }
                });
            }
        });
        assert_eq!(interner.len(), 150);
        let restored = StringInterner::from_bytes(&interner.to_bytes().unwrap()).unwrap();
        for i in 0..150 {
            let s = format!("s{i}");
            assert_eq!(restored.id_of(&s), interner.id_of(&s));
        }
    }
}
