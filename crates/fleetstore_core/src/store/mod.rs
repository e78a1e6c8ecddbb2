//! In-memory collection store.

mod collection;

use crate::config::Config;
use crate::context::DbContext;
use crate::entity::{CompositeKey, Model};
use crate::error::{CoreError, CoreResult};
use crate::transaction::{PendingWrite, Transaction};
use crate::types::TransactionId;
use collection::CollectionData;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The shared backing store.
///
/// `Store` holds committed rows for every collection in the model. Work is
/// done through a [`DbContext`], one per unit of work:
///
/// ```rust,ignore
/// let store = Store::open(model);
/// let ctx = store.context();
/// let vehicles = ctx.repository::<Vehicle>()?;
/// vehicles.insert(vehicle)?;
/// ctx.save_changes()?;
/// ```
///
/// Reads see committed rows plus the pending writes of the reading
/// context's own open transaction. Commits apply all of a transaction's
/// writes under one write lock, so other readers never see half of one.
pub struct Store {
    /// Configuration.
    config: Config,
    /// Entity metadata provider.
    model: Arc<Model>,
    /// Committed rows per collection.
    collections: RwLock<HashMap<&'static str, CollectionData>>,
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Number of commits that will fail with a transient error.
    pending_faults: AtomicU32,
}

impl Store {
    /// Opens an empty store with the default configuration.
    #[must_use]
    pub fn open(model: Model) -> Arc<Self> {
        Self::open_with_config(model, Config::default())
    }

    /// Opens an empty store with a custom configuration.
    #[must_use]
    pub fn open_with_config(model: Model, config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            model: Arc::new(model),
            collections: RwLock::new(HashMap::new()),
            next_txid: AtomicU64::new(1),
            pending_faults: AtomicU32::new(0),
        })
    }

    /// Creates a new unit-of-work context over this store.
    #[must_use]
    pub fn context(self: &Arc<Self>) -> DbContext {
        DbContext::new(Arc::clone(self))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the entity metadata provider.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Returns the number of committed rows in `collection`.
    #[must_use]
    pub fn row_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, CollectionData::len)
    }

    /// Makes the next `count` commits fail with `TransientStore`.
    ///
    /// Used to exercise retry paths in tests and demos.
    pub fn inject_transient_faults(&self, count: u32) {
        self.pending_faults.store(count, Ordering::SeqCst);
    }

    /// Begins a new transaction.
    pub(crate) fn begin(&self) -> Transaction {
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        debug!(txn = %txid, "transaction started");
        Transaction::new(txid)
    }

    /// Commits a transaction.
    ///
    /// Every write is validated before any is applied: inserting an existing
    /// key fails with `DuplicateKey`, updating or deleting a missing row with
    /// `ConcurrencyConflict`. Returns the number of rows written.
    pub(crate) fn commit(&self, txn: &mut Transaction) -> CoreResult<usize> {
        txn.ensure_active()?;

        if self.take_fault() {
            return Err(CoreError::transient(format!(
                "connection reset while committing {}",
                txn.id()
            )));
        }

        let writes = txn.ordered_writes();
        let mut collections = self.collections.write();

        for ((collection, key), write) in &writes {
            let exists = collections
                .get(collection)
                .is_some_and(|data| data.contains(key));
            match write {
                PendingWrite::Insert { .. } if exists => {
                    return Err(CoreError::duplicate_key(*collection, key.encode()));
                }
                PendingWrite::Update { .. } | PendingWrite::Delete if !exists => {
                    return Err(CoreError::concurrency_conflict(*collection, key.encode()));
                }
                _ => {}
            }
        }

        for ((collection, key), write) in &writes {
            let data = collections.entry(*collection).or_default();
            match write {
                PendingWrite::Insert { payload } => data.insert(key.clone(), Arc::clone(payload)),
                PendingWrite::Update { payload } => {
                    data.update(key, Arc::clone(payload));
                }
                PendingWrite::Delete => {
                    data.delete(key);
                }
            }
        }
        drop(collections);

        let count = writes.len();
        txn.mark_committed();
        info!(txn = %txn.id(), writes = count, "transaction committed");
        Ok(count)
    }

    /// Rolls back a transaction, discarding its pending writes.
    pub(crate) fn rollback(&self, txn: &mut Transaction) {
        let discarded = txn.write_count();
        txn.mark_rolled_back();
        info!(txn = %txn.id(), discarded, "transaction rolled back");
    }

    /// Returns every row of `collection` in natural order, as seen from
    /// `txn` if one is given.
    pub(crate) fn scan(
        &self,
        collection: &'static str,
        txn: Option<&Transaction>,
    ) -> Vec<(CompositeKey, Arc<[u8]>)> {
        let collections = self.collections.read();
        let mut rows = Vec::new();

        if let Some(data) = collections.get(collection) {
            for row in data.rows() {
                match txn.and_then(|t| t.pending_write(collection, &row.key)) {
                    Some(PendingWrite::Delete) => {}
                    Some(PendingWrite::Update { payload } | PendingWrite::Insert { payload }) => {
                        rows.push((row.key.clone(), Arc::clone(payload)));
                    }
                    None => rows.push((row.key.clone(), Arc::clone(&row.payload))),
                }
            }
        }

        if let Some(txn) = txn {
            for (key, payload) in txn.staged_inserts(collection) {
                let shadowed = collections
                    .get(collection)
                    .is_some_and(|data| data.contains(key));
                if !shadowed {
                    rows.push((key.clone(), Arc::clone(payload)));
                }
            }
        }

        rows
    }

    /// Returns one row, as seen from `txn` if one is given.
    pub(crate) fn get(
        &self,
        collection: &'static str,
        key: &CompositeKey,
        txn: Option<&Transaction>,
    ) -> Option<Arc<[u8]>> {
        match txn.and_then(|t| t.pending_write(collection, key)) {
            Some(PendingWrite::Delete) => None,
            Some(PendingWrite::Update { payload } | PendingWrite::Insert { payload }) => {
                Some(Arc::clone(payload))
            }
            None => self
                .collections
                .read()
                .get(collection)
                .and_then(|data| data.get(key))
                .map(|row| Arc::clone(&row.payload)),
        }
    }

    /// Renders a key for log fields, honoring `sensitive_logging`.
    pub(crate) fn render_key(&self, key: &CompositeKey) -> String {
        if self.config.sensitive_logging {
            key.encode()
        } else {
            "<redacted>".to_string()
        }
    }

    fn take_fault(&self) -> bool {
        self.pending_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<Store> {
        Store::open(Model::default())
    }

    fn payload(byte: u8) -> Arc<[u8]> {
        Arc::from(vec![byte])
    }

    fn insert(store: &Store, key: i64, byte: u8) {
        let mut txn = store.begin();
        txn.stage("parts", key.into(), PendingWrite::Insert { payload: payload(byte) })
            .unwrap();
        store.commit(&mut txn).unwrap();
    }

    #[test]
    fn commit_makes_rows_visible() {
        let store = store();
        insert(&store, 1, 10);
        insert(&store, 2, 20);

        assert_eq!(store.row_count("parts"), 2);
        assert_eq!(
            store.get("parts", &1i64.into(), None).as_deref(),
            Some(&[10u8][..])
        );
    }

    #[test]
    fn uncommitted_writes_are_private_to_the_transaction() {
        let store = store();
        insert(&store, 1, 10);

        let mut txn = store.begin();
        txn.stage("parts", 2i64.into(), PendingWrite::Insert { payload: payload(20) })
            .unwrap();
        txn.stage("parts", 1i64.into(), PendingWrite::Delete).unwrap();

        assert_eq!(store.scan("parts", None).len(), 1);

        let seen: Vec<_> = store
            .scan("parts", Some(&txn))
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(seen, vec![CompositeKey::from(2i64)]);

        store.rollback(&mut txn);
        assert_eq!(store.row_count("parts"), 1);
    }

    #[test]
    fn commit_is_all_or_nothing() {
        let store = store();
        insert(&store, 1, 10);

        let mut txn = store.begin();
        txn.stage("parts", 5i64.into(), PendingWrite::Insert { payload: payload(50) })
            .unwrap();
        txn.stage("parts", 1i64.into(), PendingWrite::Insert { payload: payload(11) })
            .unwrap();

        let err = store.commit(&mut txn).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { .. }));
        assert_eq!(store.row_count("parts"), 1);
        assert!(store.get("parts", &5i64.into(), None).is_none());
    }

    #[test]
    fn update_of_missing_row_conflicts() {
        let store = store();
        let mut txn = store.begin();
        txn.stage("parts", 7i64.into(), PendingWrite::Update { payload: payload(1) })
            .unwrap();

        let err = store.commit(&mut txn).unwrap_err();
        assert!(matches!(err, CoreError::ConcurrencyConflict { .. }));
    }

    #[test]
    fn injected_faults_fail_commits_then_clear() {
        let store = store();
        store.inject_transient_faults(1);

        let mut txn = store.begin();
        txn.stage("parts", 1i64.into(), PendingWrite::Insert { payload: payload(1) })
            .unwrap();
        let err = store.commit(&mut txn).unwrap_err();
        assert!(err.is_transient());
        assert!(txn.is_active());

        store.commit(&mut txn).unwrap();
        assert_eq!(store.row_count("parts"), 1);
    }

    #[test]
    fn keys_are_redacted_unless_sensitive_logging() {
        let key = CompositeKey::from(42i64);
        assert_eq!(store().render_key(&key), "<redacted>");

        let open = Store::open_with_config(Model::default(), Config::new().sensitive_logging(true));
        assert_eq!(open.render_key(&key), "42");
    }
}
