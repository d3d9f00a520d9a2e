//! Source-to-copy id tables filled while copying and read while rewriting
//! links.
//!
//! One [`RemapTables`] exists per clone run. Branch tasks share it through an
//! `Arc` and only ever add entries.
//!
//! Locks are synchronous and never held across an await.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Concurrent map from a template entity id to the id of its copy.
#[derive(Debug, Default)]
pub struct RemapTable {
    entries: RwLock<HashMap<i64, i64>>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<i64, i64>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<i64, i64>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `source → copy`. Returns `false` and keeps the existing entry
    /// when `source` was already mapped.
    pub fn insert(&self, source: i64, copy: i64) -> bool {
        let mut entries = self.write();
        match entries.get(&source) {
            Some(existing) => {
                warn!(
                    subsystem = "clone",
                    component = "remap",
                    source_id = source,
                    existing_id = *existing,
                    rejected_id = copy,
                    "Source id already mapped, keeping first copy"
                );
                false
            }
            None => {
                entries.insert(source, copy);
                true
            }
        }
    }

    /// Record several pairs under one lock. Returns how many were new.
    pub fn insert_all<I>(&self, pairs: I) -> usize
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut entries = self.write();
        let mut added = 0;
        for (source, copy) in pairs {
            if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(source) {
                slot.insert(copy);
                added += 1;
            } else {
                warn!(
                    subsystem = "clone",
                    component = "remap",
                    source_id = source,
                    rejected_id = copy,
                    "Source id already mapped, keeping first copy"
                );
            }
        }
        added
    }

    pub fn get(&self, source: i64) -> Option<i64> {
        self.read().get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ids of every copy, ascending.
    pub fn copied_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.read().values().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Point-in-time copy of the table.
    pub fn snapshot(&self) -> HashMap<i64, i64> {
        self.read().clone()
    }
}

/// The page and block tables of one clone run.
#[derive(Debug, Default)]
pub struct RemapTables {
    pub pages: RemapTable,
    pub blocks: RemapTable,
}

impl RemapTables {
    pub fn new() -> Self {
        Self::default()
    }
}
