//! Per-context entity storage.
//!
//! Rows are append-only and addressed by a dense `u32` row id; re-putting an
//! identifier rewrites its row in place so store iteration order stays the
//! order in which identifiers were first written. Every index is a bitmap of
//! row ids so pattern queries reduce to bitmap intersections.

use std::collections::HashMap;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::StrId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Row {
    pub ident: StrId,
    pub entity_type: StrId,
    pub attrs: Vec<(StrId, StrId)>,
    pub links: Vec<(StrId, StrId)>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Partition {
    rows: Vec<Row>,
    /// ident -> row id
    by_ident: HashMap<StrId, u32>,
    /// type -> rows
    type_index: HashMap<StrId, RoaringBitmap>,
    /// (attr key, attr value) -> rows
    attr_index: HashMap<(StrId, StrId), RoaringBitmap>,
    /// (relation, target ident) -> source rows
    link_index: HashMap<(StrId, StrId), RoaringBitmap>,
}

/// An interned [`crate::Pattern`]. `types == None` means "any type".
pub(crate) struct InternedPattern {
    pub types: Option<Vec<StrId>>,
    pub attrs: Vec<(StrId, StrId)>,
    pub links: Vec<(StrId, StrId)>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Insert or rewrite the row for `row.ident`. Returns `true` if the
    /// identifier was new to this partition.
    pub fn upsert(&mut self, row: Row) -> bool {
        if let Some(&id) = self.by_ident.get(&row.ident) {
            self.unindex(id);
            self.rows[id as usize] = row;
            self.index(id);
            return false;
        }

        let id = self.rows.len() as u32;
        self.by_ident.insert(row.ident, id);
        self.rows.push(row);
        self.index(id);
        true
    }

    pub fn get(&self, ident: StrId) -> Option<&Row> {
        let id = *self.by_ident.get(&ident)?;
        self.rows.get(id as usize)
    }

    /// Rows matching `pattern`, in row order.
    pub fn matching(&self, pattern: &InternedPattern) -> Vec<&Row> {
        let mut candidates: Option<RoaringBitmap> = None;

        if let Some(types) = &pattern.types {
            let mut union = RoaringBitmap::new();
            for t in types {
                if let Some(bits) = self.type_index.get(t) {
                    union |= bits;
                }
            }
            candidates = Some(union);
        }

        for key in &pattern.attrs {
            let bits = self.attr_index.get(key).cloned().unwrap_or_default();
            candidates = Some(match candidates {
                Some(c) => c & bits,
                None => bits,
            });
        }

        for key in &pattern.links {
            let bits = self.link_index.get(key).cloned().unwrap_or_default();
            candidates = Some(match candidates {
                Some(c) => c & bits,
                None => bits,
            });
        }

        match candidates {
            Some(bits) => bits
                .iter()
                .filter_map(|id| self.rows.get(id as usize))
                .collect(),
            None => self.rows.iter().collect(),
        }
    }

    fn index(&mut self, id: u32) {
        let row = &self.rows[id as usize];
        self.type_index
            .entry(row.entity_type)
            .or_insert_with(RoaringBitmap::new)
            .insert(id);
        for &key in &row.attrs {
            self.attr_index
                .entry(key)
                .or_insert_with(RoaringBitmap::new)
                .insert(id);
        }
        for &key in &row.links {
            self.link_index
                .entry(key)
                .or_insert_with(RoaringBitmap::new)
                .insert(id);
        }
    }

    fn unindex(&mut self, id: u32) {
        let row = &self.rows[id as usize];
        if let Some(bits) = self.type_index.get_mut(&row.entity_type) {
            bits.remove(id);
        }
        for key in &row.attrs {
            if let Some(bits) = self.attr_index.get_mut(key) {
                bits.remove(id);
            }
        }
        for key in &row.links {
            if let Some(bits) = self.link_index.get_mut(key) {
                bits.remove(id);
            }
        }
    }
}
