//! Transactions and the retrying execution strategy.
//!
//! A [`Transaction`] collects pending writes for one unit of work. The store
//! applies them all at once on commit or drops them on rollback. The
//! [`ExecutionStrategy`] re-runs a whole unit of work when the store reports
//! a transient failure.

mod state;
mod strategy;

pub use state::{PendingWrite, RowAddress, Transaction, TransactionState};
pub use strategy::ExecutionStrategy;
