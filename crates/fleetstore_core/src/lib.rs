//! # Fleetstore Core
//!
//! Generic repository and query engine for fleetstore.
//!
//! This crate provides:
//! - Entity metadata: per-type accessor tables registered in a [`Model`]
//! - An in-memory collection store with all-or-nothing transactions
//! - Unit-of-work contexts with change tracking
//! - Composable queries: default filters, includes, predicates, dynamic
//!   ordering and pagination
//! - Batch update by composite key and set-based bulk operations
//! - A retrying transaction wrapper for transient store failures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleetstore_core::{EntityMetadata, Model, QueryOptions, Store};
//!
//! let model = Model::builder()
//!     .entity(
//!         EntityMetadata::builder("vehicles")
//!             .key("Id", |v: &Vehicle| &v.id, |v: &mut Vehicle| &mut v.id)
//!             .property("Make", |v: &Vehicle| &v.make, |v: &mut Vehicle| &mut v.make)
//!             .build(),
//!     )
//!     .build()?;
//!
//! let store = Store::open(model);
//! let ctx = store.context();
//! let vehicles = ctx.repository::<Vehicle>()?;
//! let page = vehicles.query(&QueryOptions::new().order_by("Make", true).page(1, 20))?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod entity;
mod error;
mod query;
mod repository;
mod store;
mod transaction;
mod types;

pub use config::{Config, RetryConfig};
pub use context::{DbContext, EntryState, TransactionScope};
pub use entity::{
    decode_row, encode_row, CompositeKey, Entity, EntityMetadata, EntityMetadataBuilder, Model,
    ModelBuilder, PropertyDescriptor, KEY_DELIMITER,
};
pub use error::{CoreError, CoreResult};
pub use query::{
    apply_ordering, paginate, Include, IncludeLoader, OrderDirection, PagedResult, Predicate,
    QueryOptions, SortKey, SortPlan, ViewMode,
};
pub use repository::{BatchOutcome, Repository, SetClause};
pub use store::Store;
pub use transaction::{
    ExecutionStrategy, PendingWrite, RowAddress, Transaction, TransactionState,
};
pub use types::{FieldKind, FieldType, FieldValue, TransactionId, Value};

/// Re-exported so callers can build cancellation tokens without a direct
/// dependency.
pub use tokio_util::sync::CancellationToken;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
