//! Unit-of-work contexts.

mod tracker;
mod unit_of_work;

pub use tracker::EntryState;
pub use unit_of_work::TransactionScope;

use crate::entity::{decode_row, CompositeKey, Entity, EntityMetadata, Model};
use crate::error::{CoreError, CoreResult};
use crate::repository::Repository;
use crate::store::Store;
use crate::transaction::{PendingWrite, RowAddress, Transaction};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracker::ChangeTracker;

/// One unit of work over a [`Store`].
///
/// A context owns a change tracker and at most one open transaction.
/// Repository writes are queued in the tracker and reach the store only
/// through [`save_changes`](Self::save_changes). Contexts are cheap; create
/// one per request or service call.
///
/// Locks are always taken in the order tracker, transaction, store.
pub struct DbContext {
    store: Arc<Store>,
    tracker: Mutex<ChangeTracker>,
    transaction: Mutex<Option<Transaction>>,
    cancellation: Option<CancellationToken>,
}

impl DbContext {
    pub(crate) fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            tracker: Mutex::new(ChangeTracker::default()),
            transaction: Mutex::new(None),
            cancellation: None,
        }
    }

    /// Attaches a cancellation token. Every store access made through this
    /// context fails with `Cancelled` once the token fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the entity metadata provider.
    #[must_use]
    pub fn model(&self) -> &Model {
        self.store.model()
    }

    /// Returns a repository for `T`.
    ///
    /// Fails with `Schema` if `T` is not mapped.
    pub fn repository<T: Entity>(&self) -> CoreResult<Repository<'_, T>> {
        Ok(Repository::new(self, self.model().entity::<T>()?))
    }

    /// Fails with `Cancelled` if the context's token has fired.
    pub fn check_cancelled(&self) -> CoreResult<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(CoreError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Writes every tracked change to the store.
    ///
    /// With a transaction open the writes join it; otherwise they commit
    /// in an implicit transaction of their own. On success the tracker
    /// accepts the changes. Returns the number of rows written.
    pub fn save_changes(&self) -> CoreResult<usize> {
        self.check_cancelled()?;

        let mut tracker = self.tracker.lock();
        let changes = tracker.pending_changes()?;
        if changes.is_empty() {
            return Ok(0);
        }

        let count = self.apply_writes(changes)?;
        tracker.accept_changes();
        debug!(rows = count, "changes saved");
        Ok(count)
    }

    /// Returns the tracking state of `entity`, or `None` if it is not
    /// attached.
    pub fn entry_state<T: Entity>(&self, entity: &T) -> CoreResult<Option<EntryState>> {
        let metadata = self.model().entity::<T>()?;
        let key = metadata.key_of(entity)?;
        Ok(self.tracker.lock().state(metadata.collection(), &key))
    }

    /// Returns the number of attached entities.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracker.lock().len()
    }

    /// Returns true while a transaction is open on this context.
    #[must_use]
    pub fn has_open_transaction(&self) -> bool {
        self.transaction.lock().is_some()
    }

    /// Drops every attached entity without saving.
    pub fn clear_tracker(&self) {
        self.tracker.lock().clear();
    }

    pub(crate) fn tracker(&self) -> MutexGuard<'_, ChangeTracker> {
        self.tracker.lock()
    }

    /// Stages writes into the open transaction, or commits them at once if
    /// none is open. Either every write is staged or none is.
    pub(crate) fn apply_writes(&self, writes: Vec<(RowAddress, PendingWrite)>) -> CoreResult<usize> {
        self.check_cancelled()?;

        let mut slot = self.transaction.lock();
        match slot.as_mut() {
            Some(txn) => txn.stage_all(writes),
            None => {
                drop(slot);
                let mut txn = self.store.begin();
                let result = txn
                    .stage_all(writes)
                    .and_then(|_| self.store.commit(&mut txn));
                if result.is_err() {
                    self.store.rollback(&mut txn);
                }
                result
            }
        }
    }

    /// Reads and decodes every row of `T`'s collection as seen from this
    /// context, in natural order. With `resolve_tracked`, attached entities
    /// stand in for their stored rows and rows pending deletion are
    /// skipped.
    pub(crate) fn read_entities<T: Entity>(
        &self,
        metadata: &EntityMetadata<T>,
        resolve_tracked: bool,
    ) -> CoreResult<Vec<(CompositeKey, T)>> {
        self.check_cancelled()?;
        let collection = metadata.collection();

        let rows = {
            let txn = self.transaction.lock();
            self.store.scan(collection, txn.as_ref())
        };

        let tracker = resolve_tracked.then(|| self.tracker.lock());
        let mut entities = Vec::with_capacity(rows.len());
        for (key, payload) in rows {
            if let Some(tracker) = &tracker {
                match tracker.state(collection, &key) {
                    Some(EntryState::Deleted) => continue,
                    Some(_) => {
                        if let Some(entity) = tracker.get::<T>(collection, &key) {
                            entities.push((key, entity.clone()));
                            continue;
                        }
                    }
                    None => {}
                }
            }
            entities.push((key, decode_row(&payload)?));
        }
        Ok(entities)
    }

    /// Reads one row of `T`'s collection as seen from this context.
    pub(crate) fn read_entity<T: Entity>(
        &self,
        collection: &'static str,
        key: &CompositeKey,
    ) -> CoreResult<Option<T>> {
        self.check_cancelled()?;
        let payload = {
            let txn = self.transaction.lock();
            self.store.get(collection, key, txn.as_ref())
        };
        payload.map(|p| decode_row(&p)).transpose()
    }

    /// Attaches entities that are not tracked yet.
    pub(crate) fn attach_all<T: Entity>(
        &self,
        collection: &'static str,
        entities: impl IntoIterator<Item = (CompositeKey, T)>,
        state: EntryState,
    ) {
        let mut tracker = self.tracker.lock();
        for (key, entity) in entities {
            if tracker.state(collection, &key).is_none() {
                tracker.attach(collection, key, entity, state);
            }
        }
    }
}

impl std::fmt::Debug for DbContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbContext")
            .field("tracked", &self.tracked_count())
            .field("transaction", &self.has_open_transaction())
            .field("cancellable", &self.cancellation.is_some())
            .finish()
    }
}
