//! Query composition: predicates, ordering, includes and pagination.
//!
//! A query runs as a fixed pipeline over one collection:
//!
//! 1. read the view selected by [`ViewMode`]
//! 2. apply the entity's default filter unless told to ignore it
//! 3. run each [`Include`] directive in order
//! 4. apply the caller's [`Predicate`]
//! 5. order by the [`SortKey`] list
//! 6. cut the requested page with [`paginate`]

mod include;
mod options;
mod order;
mod page;
pub(crate) mod pipeline;
mod predicate;

pub use include::{Include, IncludeLoader};
pub use options::{QueryOptions, ViewMode};
pub use order::{apply_ordering, OrderDirection, SortKey, SortPlan};
pub use page::{paginate, PagedResult};
pub use predicate::Predicate;
