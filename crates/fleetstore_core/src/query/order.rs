//! Dynamic multi-key ordering by property name.

use crate::entity::{EntityMetadata, PropertyDescriptor};
use crate::types::Value;
use std::cmp::Ordering;
use tracing::debug;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One `(property name, direction)` entry of an ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Property name, matched ignoring ASCII case.
    pub property: String,
    /// Direction.
    pub direction: OrderDirection,
}

impl SortKey {
    /// Creates a sort key.
    pub fn new(property: impl Into<String>, ascending: bool) -> Self {
        Self {
            property: property.into(),
            direction: if ascending {
                OrderDirection::Ascending
            } else {
                OrderDirection::Descending
            },
        }
    }

    /// Ascending on `property`.
    pub fn asc(property: impl Into<String>) -> Self {
        Self::new(property, true)
    }

    /// Descending on `property`.
    pub fn desc(property: impl Into<String>) -> Self {
        Self::new(property, false)
    }
}

impl From<(&str, bool)> for SortKey {
    fn from((property, ascending): (&str, bool)) -> Self {
        Self::new(property, ascending)
    }
}

impl From<(String, bool)> for SortKey {
    fn from((property, ascending): (String, bool)) -> Self {
        Self::new(property, ascending)
    }
}

/// An ordering resolved against an entity's metadata.
pub struct SortPlan<T> {
    keys: Vec<(PropertyDescriptor<T>, OrderDirection)>,
}

impl<T: 'static> SortPlan<T> {
    /// Resolves `spec` against `metadata`.
    ///
    /// Names that match no property are dropped; the remaining entries keep
    /// their relative order.
    pub fn compose(metadata: &EntityMetadata<T>, spec: &[SortKey]) -> Self {
        let keys = spec
            .iter()
            .filter_map(|key| match metadata.property(&key.property) {
                Some(property) => Some((property.clone(), key.direction)),
                None => {
                    debug!(
                        collection = metadata.collection(),
                        property = %key.property,
                        "ignoring unknown sort property"
                    );
                    None
                }
            })
            .collect();
        Self { keys }
    }

    /// Returns true if no usable sort key remains.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sorts `items`. Later keys only break ties on earlier ones, and equal
    /// items keep their input order.
    pub fn apply(&self, items: Vec<T>) -> Vec<T> {
        self.apply_by(items, |item| item)
    }

    /// Sorts values that carry an entity, reading sort keys through
    /// `entity`.
    pub fn apply_by<I>(&self, items: Vec<I>, entity: impl Fn(&I) -> &T) -> Vec<I> {
        if self.keys.is_empty() {
            return items;
        }

        let mut decorated: Vec<(Vec<Value>, I)> = items
            .into_iter()
            .map(|item| {
                let values = self
                    .keys
                    .iter()
                    .map(|(p, _)| p.get(entity(&item)))
                    .collect();
                (values, item)
            })
            .collect();

        decorated.sort_by(|(a, _), (b, _)| self.compare(a, b));
        decorated.into_iter().map(|(_, item)| item).collect()
    }

    fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        for ((_, direction), (x, y)) in self.keys.iter().zip(a.iter().zip(b)) {
            let ord = match direction {
                OrderDirection::Ascending => x.cmp(y),
                OrderDirection::Descending => y.cmp(x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Orders `items` by `spec`, resolving names against `metadata`.
pub fn apply_ordering<T: 'static>(
    items: Vec<T>,
    metadata: &EntityMetadata<T>,
    spec: &[SortKey],
) -> Vec<T> {
    SortPlan::compose(metadata, spec).apply(items)
}
