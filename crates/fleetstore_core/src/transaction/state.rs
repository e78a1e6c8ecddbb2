//! Transaction state.

use crate::entity::CompositeKey;
use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;
use std::collections::HashMap;
use std::sync::Arc;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is open and accepts writes.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A pending write in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Add a row that must not exist yet.
    Insert {
        /// Row payload (CBOR bytes).
        payload: Arc<[u8]>,
    },
    /// Replace the payload of an existing row.
    Update {
        /// Row payload (CBOR bytes).
        payload: Arc<[u8]>,
    },
    /// Remove an existing row.
    Delete,
}

/// Address of one row: collection name plus composite key.
pub type RowAddress = (&'static str, CompositeKey);

#[derive(Debug, Clone)]
struct Staged {
    seq: u64,
    write: PendingWrite,
}

/// An open transaction.
///
/// Writes staged here are visible to reads made through the same context
/// and reach the store only on commit.
#[derive(Debug)]
pub struct Transaction {
    /// Transaction ID.
    id: TransactionId,
    /// Current state.
    state: TransactionState,
    /// Pending writes: (collection, key) -> write operation.
    writes: HashMap<RowAddress, Staged>,
    /// Staging order for new rows.
    next_seq: u64,
}

impl Transaction {
    /// Creates a new transaction.
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            writes: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Stages a write, folding it into any earlier write for the same row.
    ///
    /// Insert then update stays an insert with the new payload; insert then
    /// delete cancels out; delete then insert becomes an update.
    pub fn stage(
        &mut self,
        collection: &'static str,
        key: CompositeKey,
        write: PendingWrite,
    ) -> CoreResult<()> {
        self.ensure_active()?;

        let address = (collection, key);
        let merged = match (self.writes.get(&address).map(|s| &s.write), write) {
            (None, write) => Some(write),
            (Some(PendingWrite::Insert { .. }), PendingWrite::Insert { .. }) => {
                return Err(CoreError::duplicate_key(collection, address.1.encode()));
            }
            (Some(PendingWrite::Insert { .. }), PendingWrite::Update { payload }) => {
                Some(PendingWrite::Insert { payload })
            }
            (Some(PendingWrite::Insert { .. }), PendingWrite::Delete) => None,
            (Some(PendingWrite::Update { .. }), PendingWrite::Insert { .. }) => {
                return Err(CoreError::duplicate_key(collection, address.1.encode()));
            }
            (Some(PendingWrite::Update { .. }), write) => Some(write),
            (Some(PendingWrite::Delete), PendingWrite::Insert { payload }) => {
                Some(PendingWrite::Update { payload })
            }
            (Some(PendingWrite::Delete), PendingWrite::Update { .. }) => {
                return Err(CoreError::concurrency_conflict(collection, address.1.encode()));
            }
            (Some(PendingWrite::Delete), PendingWrite::Delete) => Some(PendingWrite::Delete),
        };

        match merged {
            Some(write) => {
                let seq = match self.writes.get(&address) {
                    Some(existing) => existing.seq,
                    None => {
                        self.next_seq += 1;
                        self.next_seq
                    }
                };
                self.writes.insert(address, Staged { seq, write });
            }
            None => {
                self.writes.remove(&address);
            }
        }
        Ok(())
    }

    /// Stages every write or none of them.
    ///
    /// The writes are folded into a copy of the pending set, which replaces
    /// the current one only if all of them stage. Returns the number of
    /// writes staged.
    pub fn stage_all(
        &mut self,
        writes: impl IntoIterator<Item = (RowAddress, PendingWrite)>,
    ) -> CoreResult<usize> {
        self.ensure_active()?;

        let mut scratch = Self {
            id: self.id,
            state: self.state,
            writes: self.writes.clone(),
            next_seq: self.next_seq,
        };
        let mut count = 0;
        for ((collection, key), write) in writes {
            scratch.stage(collection, key, write)?;
            count += 1;
        }

        self.writes = scratch.writes;
        self.next_seq = scratch.next_seq;
        Ok(count)
    }

    /// Gets the pending write for a row.
    #[must_use]
    pub fn pending_write(
        &self,
        collection: &'static str,
        key: &CompositeKey,
    ) -> Option<&PendingWrite> {
        self.writes
            .get(&(collection, key.clone()))
            .map(|staged| &staged.write)
    }

    /// Returns every pending write in staging order.
    pub fn ordered_writes(&self) -> Vec<(&RowAddress, &PendingWrite)> {
        let mut writes: Vec<_> = self.writes.iter().collect();
        writes.sort_by_key(|(_, staged)| staged.seq);
        writes
            .into_iter()
            .map(|(address, staged)| (address, &staged.write))
            .collect()
    }

    /// Returns rows staged for insertion into `collection`, in staging order.
    pub fn staged_inserts(&self, collection: &str) -> Vec<(&CompositeKey, &Arc<[u8]>)> {
        self.ordered_writes()
            .into_iter()
            .filter_map(|((c, key), write)| match write {
                PendingWrite::Insert { payload } if *c == collection => Some((key, payload)),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of pending writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Marks the transaction as committed.
    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    /// Discards pending writes and marks the transaction as rolled back.
    pub(crate) fn mark_rolled_back(&mut self) {
        self.writes.clear();
        self.state = TransactionState::RolledBack;
    }

    /// Ensures the transaction is active.
    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::RolledBack => Err(CoreError::invalid_operation(
                "transaction already rolled back",
            )),
        }
    }
}
