//! Rows of one collection.

use crate::entity::CompositeKey;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A stored row.
#[derive(Debug, Clone)]
pub(crate) struct StoredRow {
    pub(crate) key: CompositeKey,
    pub(crate) payload: Arc<[u8]>,
}

/// Insertion-ordered rows with a key index.
///
/// Row positions never move: an update keeps the row where it was, so scans
/// return rows in the order they were first inserted.
#[derive(Debug, Default)]
pub(crate) struct CollectionData {
    rows: BTreeMap<u64, StoredRow>,
    index: HashMap<CompositeKey, u64>,
    next_position: u64,
}

impl CollectionData {
    pub(crate) fn contains(&self, key: &CompositeKey) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn get(&self, key: &CompositeKey) -> Option<&StoredRow> {
        self.index.get(key).and_then(|pos| self.rows.get(pos))
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &StoredRow> {
        self.rows.values()
    }

    /// Appends a row. The caller has checked the key is free.
    pub(crate) fn insert(&mut self, key: CompositeKey, payload: Arc<[u8]>) {
        let position = self.next_position;
        self.next_position += 1;
        self.index.insert(key.clone(), position);
        self.rows.insert(position, StoredRow { key, payload });
    }

    /// Replaces a row's payload in place. Returns false if the key is absent.
    pub(crate) fn update(&mut self, key: &CompositeKey, payload: Arc<[u8]>) -> bool {
        match self.index.get(key).and_then(|pos| self.rows.get_mut(pos)) {
            Some(row) => {
                row.payload = payload;
                true
            }
            None => false,
        }
    }

    /// Removes a row. Returns false if the key is absent.
    pub(crate) fn delete(&mut self, key: &CompositeKey) -> bool {
        match self.index.remove(key) {
            Some(pos) => self.rows.remove(&pos).is_some(),
            None => false,
        }
    }
}
