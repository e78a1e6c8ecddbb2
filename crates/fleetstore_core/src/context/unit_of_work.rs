//! Explicit transactions and the retrying transaction wrapper.

use super::DbContext;
use crate::error::{CoreError, CoreResult};
use crate::transaction::ExecutionStrategy;
use tracing::debug;

/// An open transaction on a [`DbContext`].
///
/// Dropping the scope without calling [`commit`](Self::commit) rolls the
/// transaction back, also when unwinding.
#[must_use = "dropping a transaction scope rolls it back"]
pub struct TransactionScope<'a> {
    ctx: &'a DbContext,
    finished: bool,
}

impl TransactionScope<'_> {
    /// Commits the transaction.
    ///
    /// Tracked changes are not saved implicitly; call
    /// [`DbContext::save_changes`] first. A failed commit rolls back.
    pub fn commit(mut self) -> CoreResult<usize> {
        self.finished = true;
        let txn = self.ctx.transaction.lock().take();
        let Some(mut txn) = txn else {
            return Err(CoreError::invalid_operation("no open transaction"));
        };

        match self.ctx.store.commit(&mut txn) {
            Ok(count) => Ok(count),
            Err(err) => {
                self.ctx.store.rollback(&mut txn);
                self.ctx.tracker.lock().clear();
                Err(err)
            }
        }
    }

    /// Rolls back the transaction and clears the change tracker.
    pub fn rollback(mut self) {
        self.finished = true;
        self.ctx.discard_transaction();
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.ctx.discard_transaction();
        }
    }
}

impl DbContext {
    /// Opens a transaction on this context.
    ///
    /// Until it ends, reads through this context see its pending writes and
    /// [`save_changes`](Self::save_changes) stages into it. Fails with
    /// `InvalidOperation` if one is already open, or if the tracker holds
    /// unsaved changes that a rollback would discard.
    pub fn begin_transaction(&self) -> CoreResult<TransactionScope<'_>> {
        self.check_cancelled()?;
        if self.tracker.lock().has_changes() {
            return Err(CoreError::invalid_operation(
                "save or discard tracked changes before opening a transaction",
            ));
        }
        let mut slot = self.transaction.lock();
        if slot.is_some() {
            return Err(CoreError::invalid_operation(
                "a transaction is already open on this context",
            ));
        }
        *slot = Some(self.store.begin());
        Ok(TransactionScope {
            ctx: self,
            finished: false,
        })
    }

    /// Runs `operation` as one retryable unit of work.
    ///
    /// Each attempt opens a transaction, runs `operation`, saves tracked
    /// changes and commits. Changes queued before the call must be saved
    /// or discarded first; otherwise the call fails with
    /// `InvalidOperation` and the queued changes stay tracked. Any error rolls the attempt back, discarding
    /// both the pending writes and the change tracker, and is returned
    /// as is. Transient store errors re-run the whole attempt according to
    /// the store's retry policy, so `operation` must be safe to repeat.
    ///
    /// Repositories the operation needs are created beforehand and
    /// captured by the closure:
    ///
    /// ```rust,ignore
    /// let vehicles = ctx.repository::<Vehicle>()?;
    /// let parts = ctx.repository::<Part>()?;
    /// ctx.execute_in_transaction(|| {
    ///     let vehicle = vehicles.get_by_id(vehicle_id)?.ok_or(...)?;
    ///     parts.insert(Part::for_vehicle(&vehicle))?;
    ///     Ok(())
    /// })?;
    /// ```
    pub fn execute_in_transaction<R, F>(&self, mut operation: F) -> CoreResult<R>
    where
        F: FnMut() -> CoreResult<R>,
    {
        let strategy = ExecutionStrategy::new(self.store.config().retry.clone());
        strategy.execute(|attempt| {
            let scope = self.begin_transaction()?;
            debug!(attempt, "running unit of work");

            let value = operation()?;
            self.check_cancelled()?;
            self.save_changes()?;
            scope.commit()?;
            Ok(value)
        })
    }

    fn discard_transaction(&self) {
        let txn = self.transaction.lock().take();
        if let Some(mut txn) = txn {
            self.store.rollback(&mut txn);
        }
        self.tracker.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RetryConfig};
    use crate::entity::{EntityMetadata, Model};
    use crate::store::Store;
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Customer {
        id: i64,
        name: String,
    }

    fn customer(id: i64, name: &str) -> Customer {
        Customer {
            id,
            name: name.into(),
        }
    }

    fn store(retry: RetryConfig) -> Arc<Store> {
        let model = Model::builder()
            .entity(
                EntityMetadata::builder("customers")
                    .key("Id", |c: &Customer| &c.id, |c: &mut Customer| &mut c.id)
                    .property("Name", |c: &Customer| &c.name, |c: &mut Customer| &mut c.name)
                    .build(),
            )
            .build()
            .unwrap();
        Store::open_with_config(model, Config::new().retry(retry))
    }

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
    }

    #[test]
    fn failed_operation_leaves_store_unchanged() {
        let store = store(fast_retry(3));
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();

        let result: CoreResult<()> = ctx.execute_in_transaction(|| {
            customers.insert(customer(1, "Ada"))?;
            ctx.save_changes()?;
            Err(CoreError::argument("vin is required"))
        });

        assert!(matches!(result, Err(CoreError::Argument { .. })));
        assert_eq!(store.row_count("customers"), 0);
        assert_eq!(ctx.tracked_count(), 0);
        assert!(!ctx.has_open_transaction());
    }

    #[test]
    fn successful_operation_saves_and_commits() {
        let store = store(fast_retry(3));
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();

        let name = ctx
            .execute_in_transaction(|| {
                let added = customers.insert(customer(1, "Ada"))?;
                Ok(added.name)
            })
            .unwrap();

        assert_eq!(name, "Ada");
        assert_eq!(store.row_count("customers"), 1);
    }

    #[test]
    fn transient_commit_failures_rerun_the_operation() {
        let store = store(fast_retry(4));
        store.inject_transient_faults(2);
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();

        let mut runs = 0;
        ctx.execute_in_transaction(|| {
            runs += 1;
            customers.insert(customer(1, "Ada"))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(runs, 3);
        assert_eq!(store.row_count("customers"), 1);
    }

    #[test]
    fn exhausted_retries_report_the_limit() {
        let store = store(fast_retry(2));
        store.inject_transient_faults(5);
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();

        let result = ctx.execute_in_transaction(|| {
            customers.insert(customer(1, "Ada"))?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(CoreError::RetryLimitExceeded { attempts: 2, .. })
        ));
        assert_eq!(store.row_count("customers"), 0);
    }

    #[test]
    fn nested_transactions_are_rejected() {
        let store = store(fast_retry(1));
        let ctx = store.context();

        let _scope = ctx.begin_transaction().unwrap();
        assert!(matches!(
            ctx.begin_transaction(),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn dropped_scope_rolls_back() {
        let store = store(fast_retry(1));
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();

        {
            let _scope = ctx.begin_transaction().unwrap();
            customers.insert(customer(1, "Ada")).unwrap();
            ctx.save_changes().unwrap();
            assert!(customers.get_by_id(1i64).unwrap().is_some());
            assert_eq!(store.row_count("customers"), 0);
        }

        assert!(!ctx.has_open_transaction());
        assert!(customers.get_by_id(1i64).unwrap().is_none());
    }

    #[test]
    fn explicit_scope_commits() {
        let store = store(fast_retry(1));
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();

        let scope = ctx.begin_transaction().unwrap();
        customers.insert(customer(1, "Ada")).unwrap();
        customers.insert(customer(2, "Grace")).unwrap();
        ctx.save_changes().unwrap();
        assert_eq!(scope.commit().unwrap(), 2);
        assert_eq!(store.row_count("customers"), 2);
    }

    #[test]
    fn unsaved_changes_block_a_unit_of_work() {
        let store = store(fast_retry(3));
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();
        customers.insert(customer(1, "Ada")).unwrap();

        let mut runs = 0;
        let result = ctx.execute_in_transaction(|| {
            runs += 1;
            customers.insert(customer(2, "Grace"))?;
            Ok(())
        });

        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
        assert_eq!(runs, 0);
        assert_eq!(ctx.tracked_count(), 1);
        assert!(!ctx.has_open_transaction());

        assert_eq!(ctx.save_changes().unwrap(), 1);
        ctx.execute_in_transaction(|| {
            customers.insert(customer(2, "Grace"))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(store.row_count("customers"), 2);
    }

    #[test]
    fn unchanged_entities_do_not_block_a_transaction() {
        let store = store(fast_retry(1));
        let ctx = store.context();
        let customers = ctx.repository::<Customer>().unwrap();
        customers.insert(customer(1, "Ada")).unwrap();
        ctx.save_changes().unwrap();
        assert_eq!(ctx.tracked_count(), 1);

        let scope = ctx.begin_transaction().unwrap();
        scope.rollback();
        assert_eq!(ctx.tracked_count(), 0);
    }

    #[test]
    fn cancellation_rolls_back() {
        let store = store(fast_retry(3));
        let token = CancellationToken::new();
        let ctx = store.context().with_cancellation(token.clone());
        let customers = ctx.repository::<Customer>().unwrap();

        let result = ctx.execute_in_transaction(|| {
            customers.insert(customer(1, "Ada"))?;
            token.cancel();
            Ok(())
        });

        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert_eq!(store.row_count("customers"), 0);
        assert!(!ctx.has_open_transaction());
    }
}
