//! Pagination.

use serde::Serialize;

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagedResult<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Number of matching items before pagination.
    pub total_items: u64,
    /// `ceil(total_items / page_size)` when `page_size > 0`, else 0.
    pub total_pages: u64,
    /// Requested page number.
    pub page_number: i64,
    /// Requested page size.
    pub page_size: i64,
}

impl<T> PagedResult<T> {
    /// Transforms the items, keeping the counts.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_items: self.total_items,
            total_pages: self.total_pages,
            page_number: self.page_number,
            page_size: self.page_size,
        }
    }

    /// Returns true if this page has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cuts one page out of a filtered, ordered result set.
///
/// If either `page_number` or `page_size` is not positive the whole set is
/// returned. `total_pages` still follows `page_size` alone, so page 0 of
/// size 10 returns everything yet reports the real page count.
pub fn paginate<T>(items: Vec<T>, page_number: i64, page_size: i64) -> PagedResult<T> {
    let total_items = items.len() as u64;
    let total_pages = match u64::try_from(page_size) {
        Ok(size) if size > 0 => total_items.div_ceil(size),
        _ => 0,
    };

    let items = if page_number > 0 && page_size > 0 {
        let skip = (page_number - 1)
            .checked_mul(page_size)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(usize::MAX);
        let take = usize::try_from(page_size).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(take).collect()
    } else {
        items
    };

    PagedResult {
        items,
        total_items,
        total_pages,
        page_number,
        page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_page_of_two() {
        let page = paginate(vec!['A', 'B', 'C', 'D', 'E'], 2, 2);
        assert_eq!(page.items, vec!['C', 'D']);
        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn last_page_is_short() {
        let page = paginate((1..=5).collect(), 3, 2);
        assert_eq!(page.items, vec![5]);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = paginate((1..=5).collect::<Vec<i32>>(), 9, 2);
        assert!(page.is_empty());
        assert_eq!(page.total_items, 5);
    }

    #[test]
    fn zero_size_returns_everything() {
        let page = paginate((1..=5).collect::<Vec<i32>>(), 1, 0);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn page_zero_returns_everything_but_counts_pages() {
        let page = paginate((1..=5).collect::<Vec<i32>>(), 0, 2);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = paginate((1..=5).collect::<Vec<i32>>(), i64::MAX, i64::MAX);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn map_keeps_counts() {
        let page = paginate(vec![1, 2, 3], 1, 2).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total_pages, 2);
    }
}
