//! Query options.

use crate::query::include::Include;
use crate::query::order::SortKey;
use crate::query::predicate::Predicate;

/// How returned entities relate to the context's change tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Returned entities are attached to the tracker as `Unchanged`, and
    /// already-tracked identities come back in their tracked state.
    Tracked,
    /// Nothing is attached, but repeated reads of one identity within the
    /// call share one instance and tracked identities are honored.
    IdentityResolved,
    /// Stateless read straight from the store.
    #[default]
    Untracked,
}

impl ViewMode {
    /// Returns true if reads consult the tracker and share instances.
    #[must_use]
    pub fn resolves_identity(self) -> bool {
        !matches!(self, Self::Untracked)
    }
}

/// Options for [`Repository::query`](crate::Repository::query).
///
/// Pagination is skipped and the whole result returned unless both
/// `page_number` and `page_size` are positive.
///
/// ```rust,ignore
/// let options = QueryOptions::new()
///     .filter(Predicate::new(|v: &Vehicle| v.make.contains("ab")))
///     .order_by("Name", true)
///     .page(2, 20);
/// ```
pub struct QueryOptions<T> {
    /// Filter applied after includes.
    pub filter: Option<Predicate<T>>,
    /// Expansion directives, applied in order.
    pub includes: Vec<Include<T>>,
    /// Ordering; unknown property names are ignored.
    pub order_by: Vec<SortKey>,
    /// 1-based page number.
    pub page_number: i64,
    /// Page size.
    pub page_size: i64,
    /// Tracking mode.
    pub view_mode: ViewMode,
    /// Skip the entity's default query filter.
    pub ignore_query_filters: bool,
}

impl<T: 'static> QueryOptions<T> {
    /// Options that return every row, untracked, in natural order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, filter: Predicate<T>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Appends an include directive.
    #[must_use]
    pub fn include(mut self, include: Include<T>) -> Self {
        self.includes.push(include);
        self
    }

    /// Appends a sort key.
    #[must_use]
    pub fn order_by(mut self, property: impl Into<String>, ascending: bool) -> Self {
        self.order_by.push(SortKey::new(property, ascending));
        self
    }

    /// Sets the page number and size.
    #[must_use]
    pub fn page(mut self, page_number: i64, page_size: i64) -> Self {
        self.page_number = page_number;
        self.page_size = page_size;
        self
    }

    /// Sets the tracking mode.
    #[must_use]
    pub fn view_mode(mut self, mode: ViewMode) -> Self {
        self.view_mode = mode;
        self
    }

    /// Skips the default query filter.
    #[must_use]
    pub fn ignore_query_filters(mut self) -> Self {
        self.ignore_query_filters = true;
        self
    }
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            filter: None,
            includes: Vec::new(),
            order_by: Vec::new(),
            page_number: 0,
            page_size: 0,
            view_mode: ViewMode::default(),
            ignore_query_filters: false,
        }
    }
}

impl<T> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            includes: self.includes.clone(),
            order_by: self.order_by.clone(),
            page_number: self.page_number,
            page_size: self.page_size,
            view_mode: self.view_mode,
            ignore_query_filters: self.ignore_query_filters,
        }
    }
}

impl<T> std::fmt::Debug for QueryOptions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("filter", &self.filter.is_some())
            .field("includes", &self.includes)
            .field("order_by", &self.order_by)
            .field("page_number", &self.page_number)
            .field("page_size", &self.page_size)
            .field("view_mode", &self.view_mode)
            .field("ignore_query_filters", &self.ignore_query_filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::order::OrderDirection;

    #[test]
    fn defaults_return_everything_untracked() {
        let options = QueryOptions::<u32>::new();
        assert!(options.filter.is_none());
        assert_eq!(options.page_number, 0);
        assert_eq!(options.page_size, 0);
        assert_eq!(options.view_mode, ViewMode::Untracked);
        assert!(!options.ignore_query_filters);
    }

    #[test]
    fn builder_accumulates_sort_keys() {
        let options = QueryOptions::<u32>::new()
            .order_by("Make", true)
            .order_by("Year", false)
            .page(3, 25)
            .view_mode(ViewMode::Tracked);

        assert_eq!(options.order_by.len(), 2);
        assert_eq!(options.order_by[1].direction, OrderDirection::Descending);
        assert_eq!((options.page_number, options.page_size), (3, 25));
        assert!(options.view_mode.resolves_identity());
        assert!(!ViewMode::Untracked.resolves_identity());
    }
}
