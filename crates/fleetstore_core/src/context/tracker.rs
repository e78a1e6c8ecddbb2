//! Change tracking for one unit of work.

use crate::entity::{encode_row, CompositeKey, Entity};
use crate::error::CoreResult;
use crate::transaction::{PendingWrite, RowAddress};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Tracking state of an attached entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Matches the store.
    Unchanged,
    /// New; inserted on save.
    Added,
    /// Changed; updated on save.
    Modified,
    /// Removed on save.
    Deleted,
}

trait TrackedEntity: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn encode(&self) -> CoreResult<Vec<u8>>;
}

impl<T: Entity> TrackedEntity for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn encode(&self) -> CoreResult<Vec<u8>> {
        encode_row(self)
    }
}

struct Entry {
    seq: u64,
    state: EntryState,
    entity: Box<dyn TrackedEntity>,
}

/// Entities attached to a context, keyed by row address.
#[derive(Default)]
pub(crate) struct ChangeTracker {
    entries: HashMap<RowAddress, Entry>,
    next_seq: u64,
}

impl ChangeTracker {
    pub(crate) fn get<T: Entity>(&self, collection: &'static str, key: &CompositeKey) -> Option<&T> {
        self.entries
            .get(&(collection, key.clone()))
            .and_then(|e| e.entity.as_any().downcast_ref())
    }

    pub(crate) fn get_mut<T: Entity>(
        &mut self,
        collection: &'static str,
        key: &CompositeKey,
    ) -> Option<&mut T> {
        self.entries
            .get_mut(&(collection, key.clone()))
            .and_then(|e| e.entity.as_any_mut().downcast_mut())
    }

    /// Attaches `entity`, replacing any entity already tracked under the
    /// same address. A replaced entry keeps its tracking position.
    pub(crate) fn attach<T: Entity>(
        &mut self,
        collection: &'static str,
        key: CompositeKey,
        entity: T,
        state: EntryState,
    ) {
        let address = (collection, key);
        let seq = match self.entries.get(&address) {
            Some(existing) => existing.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.entries.insert(
            address,
            Entry {
                seq,
                state,
                entity: Box::new(entity),
            },
        );
    }

    pub(crate) fn set_state(
        &mut self,
        collection: &'static str,
        key: &CompositeKey,
        state: EntryState,
    ) -> bool {
        match self.entries.get_mut(&(collection, key.clone())) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    pub(crate) fn detach(&mut self, collection: &'static str, key: &CompositeKey) -> bool {
        self.entries.remove(&(collection, key.clone())).is_some()
    }

    pub(crate) fn state(&self, collection: &'static str, key: &CompositeKey) -> Option<EntryState> {
        self.entries
            .get(&(collection, key.clone()))
            .map(|entry| entry.state)
    }

    /// Translates non-`Unchanged` entries into pending writes, in tracking
    /// order.
    pub(crate) fn pending_changes(&self) -> CoreResult<Vec<(RowAddress, PendingWrite)>> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state != EntryState::Unchanged)
            .collect();
        entries.sort_by_key(|(_, entry)| entry.seq);

        entries
            .into_iter()
            .map(|(address, entry)| {
                let write = match entry.state {
                    EntryState::Added => PendingWrite::Insert {
                        payload: Arc::from(entry.entity.encode()?),
                    },
                    EntryState::Modified => PendingWrite::Update {
                        payload: Arc::from(entry.entity.encode()?),
                    },
                    EntryState::Deleted | EntryState::Unchanged => PendingWrite::Delete,
                };
                Ok((address.clone(), write))
            })
            .collect()
    }

    /// Marks saved work as done: added and modified entries become
    /// unchanged, deleted entries are detached.
    pub(crate) fn accept_changes(&mut self) {
        self.entries
            .retain(|_, entry| entry.state != EntryState::Deleted);
        for entry in self.entries.values_mut() {
            entry.state = EntryState::Unchanged;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if any entry would be written on save.
    pub(crate) fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.state != EntryState::Unchanged)
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::decode_row;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Claim {
        id: i64,
        status: String,
    }

    fn claim(id: i64, status: &str) -> Claim {
        Claim {
            id,
            status: status.into(),
        }
    }

    #[test]
    fn pending_changes_follow_tracking_order() {
        let mut tracker = ChangeTracker::default();
        tracker.attach("claims", 3i64.into(), claim(3, "New"), EntryState::Added);
        tracker.attach("claims", 1i64.into(), claim(1, "Open"), EntryState::Unchanged);
        tracker.attach("claims", 2i64.into(), claim(2, "Open"), EntryState::Deleted);

        let changes = tracker.pending_changes().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].0 .1, CompositeKey::from(3i64));
        match &changes[0].1 {
            PendingWrite::Insert { payload } => {
                assert_eq!(decode_row::<Claim>(payload).unwrap(), claim(3, "New"));
            }
            other => panic!("unexpected write: {other:?}"),
        }
        assert_eq!(changes[1].1, PendingWrite::Delete);
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut tracker = ChangeTracker::default();
        let key = CompositeKey::from(1i64);
        tracker.attach("claims", key.clone(), claim(1, "Open"), EntryState::Unchanged);

        tracker.get_mut::<Claim>("claims", &key).unwrap().status = "Closed".into();
        assert_eq!(tracker.get::<Claim>("claims", &key).unwrap().status, "Closed");
        assert!(tracker.get::<String>("claims", &key).is_none());
    }

    #[test]
    fn accept_changes_settles_states() {
        let mut tracker = ChangeTracker::default();
        tracker.attach("claims", 1i64.into(), claim(1, "a"), EntryState::Added);
        tracker.attach("claims", 2i64.into(), claim(2, "b"), EntryState::Modified);
        tracker.attach("claims", 3i64.into(), claim(3, "c"), EntryState::Deleted);

        tracker.accept_changes();

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.state("claims", &1i64.into()), Some(EntryState::Unchanged));
        assert_eq!(tracker.state("claims", &2i64.into()), Some(EntryState::Unchanged));
        assert_eq!(tracker.state("claims", &3i64.into()), None);
        assert!(tracker.pending_changes().unwrap().is_empty());
    }

    #[test]
    fn set_state_and_detach() {
        let mut tracker = ChangeTracker::default();
        let key = CompositeKey::from(5i64);
        assert!(!tracker.set_state("claims", &key, EntryState::Modified));

        tracker.attach("claims", key.clone(), claim(5, "x"), EntryState::Unchanged);
        assert!(tracker.set_state("claims", &key, EntryState::Modified));
        assert_eq!(tracker.state("claims", &key), Some(EntryState::Modified));

        assert!(tracker.detach("claims", &key));
        assert_eq!(tracker.len(), 0);
    }
}
